//! Client-side router: path matching, route registry and guarded navigation.

pub mod config;
pub mod error;
pub mod history;
pub mod navigation;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use error::{NavigationFailure, NavigationFailureType, RouterError, RouterResult};
pub use history::memory::MemoryHistory;
pub use history::RouterHistory;
pub use navigation::guards::{guard_fn, GuardError, GuardOutcome, GuardResult, NavigationGuard};
pub use navigation::{NavigationResult, Router, RouterOptions};
pub use routing::{RouteId, RouteLocation, RouteLocationRaw, RouteRecordRaw, RouteRef, View};
