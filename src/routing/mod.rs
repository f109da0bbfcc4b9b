//! Route definitions, path matching and location resolution.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     RouteRecordRaw (+ children, aliases)
//!     → tokenizer.rs (segments of tokens)
//!     → path_parser.rs (regex, keys, score)
//!     → matcher.rs (ranked insert, name index)
//!
//! Resolution:
//!     RouteLocationRaw
//!     → location.rs (split path, query, hash)
//!     → matcher.rs (first ranked match, or by name)
//!     → RouteLocation (params, matched chain, meta)
//! ```
//!
//! # Design Decisions
//! - Most specific pattern wins, independent of registration order
//! - Equal scores keep registration order
//! - Matching is a pure function of the registry and the target

pub mod encoding;
pub mod location;
pub mod matcher;
pub mod path_parser;
pub mod query;
pub mod record;
pub mod tokenizer;

pub use location::{LocationTarget, ParamValue, RouteLocation, RouteLocationRaw, RouteParams};
pub use matcher::{MatcherLocation, RouterMatcher};
pub use path_parser::{PathParser, PathParserOptions};
pub use query::{DefaultQueryCodec, LocationQuery, QueryCodec, QueryValue};
pub use record::{RouteContent, RouteId, RouteProps, RouteRecord, RouteRecordRaw, RouteRef, View};
