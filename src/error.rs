//! Router errors and navigation failures.
//!
//! # Design Decisions
//! - `RouterError` is raised: resolution errors, guard errors, redirect loops
//! - `NavigationFailure` is a value: aborted, cancelled and duplicated
//!   navigations settle successfully so callers can branch without `Err`
//! - Guard redirects never leave the controller

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::routing::location::RouteLocation;

/// Errors raised while registering, resolving or navigating.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// No route is registered under this name, or the current location has
    /// no matcher to resolve against.
    #[error("No match for {location}")]
    MatcherNotFound { location: String },

    /// A required param was absent while building a path.
    #[error("Missing required param \"{name}\"")]
    MissingParam { name: String },

    /// A param value cannot satisfy its segment pattern.
    #[error("Invalid param \"{name}\": {reason}")]
    InvalidParam { name: String, reason: String },

    /// The route path pattern could not be compiled.
    #[error("Invalid route path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    /// The route definition is malformed.
    #[error("Invalid route record \"{path}\": {reason}")]
    InvalidRecord { path: String, reason: String },

    /// Redirects chained from one navigation exceeded the bound.
    #[error("Infinite redirect in navigation from \"{from}\" to \"{to}\" after {count} redirects")]
    InfiniteRedirect { from: String, to: String, count: u32 },

    /// A navigation guard failed unexpectedly.
    #[error("Navigation guard failed: {0}")]
    Guard(Arc<dyn std::error::Error + Send + Sync>),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Why a navigation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationFailureType {
    /// A guard returned `Abort`.
    Aborted,
    /// A newer navigation superseded this one.
    Cancelled,
    /// The target is the current location.
    Duplicated,
}

impl NavigationFailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationFailureType::Aborted => "aborted",
            NavigationFailureType::Cancelled => "cancelled",
            NavigationFailureType::Duplicated => "duplicated",
        }
    }
}

/// A navigation that settled without becoming current.
#[derive(Debug, Clone)]
pub struct NavigationFailure {
    pub kind: NavigationFailureType,
    pub to: Arc<RouteLocation>,
    pub from: Arc<RouteLocation>,
}

impl NavigationFailure {
    pub fn new(kind: NavigationFailureType, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> Self {
        Self { kind, to, from }
    }

    pub fn is(&self, kind: NavigationFailureType) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NavigationFailureType::Aborted => write!(
                f,
                "Navigation aborted from \"{}\" to \"{}\" via a navigation guard.",
                self.from.full_path, self.to.full_path
            ),
            NavigationFailureType::Cancelled => write!(
                f,
                "Navigation cancelled from \"{}\" to \"{}\" with a new navigation.",
                self.from.full_path, self.to.full_path
            ),
            NavigationFailureType::Duplicated => write!(
                f,
                "Avoided redundant navigation to current location: \"{}\".",
                self.from.full_path
            ),
        }
    }
}
