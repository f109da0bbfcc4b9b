//! Scroll hook.
//!
//! The router does not scroll anything itself. After a navigation settles it
//! hands the hook the locations involved and, for history pops and the first
//! navigation, the position saved in the history entry.

use serde::{Deserialize, Serialize};

use crate::routing::location::RouteLocation;

/// A scroll offset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub left: f64,
    pub top: f64,
}

impl ScrollPosition {
    pub fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// Called once per settled navigation that became current, and for
/// duplicated navigations with `from` as both locations.
pub trait ScrollBehavior: Send + Sync {
    fn scroll(&self, to: &RouteLocation, from: &RouteLocation, saved_position: Option<ScrollPosition>);
}

impl<F> ScrollBehavior for F
where
    F: Fn(&RouteLocation, &RouteLocation, Option<ScrollPosition>) + Send + Sync,
{
    fn scroll(&self, to: &RouteLocation, from: &RouteLocation, saved_position: Option<ScrollPosition>) {
        (self)(to, from, saved_position)
    }
}
