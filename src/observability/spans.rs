//! Navigation spans.
//!
//! Every navigation runs inside a `navigation` span carrying its ID and
//! target, so guard and history events of concurrent navigations can be told
//! apart.

use tracing::Span;
use uuid::Uuid;

/// Generate a navigation ID.
pub fn navigation_id() -> Uuid {
    Uuid::new_v4()
}

/// Span wrapping one navigation.
pub fn navigation_span(id: Uuid, to: &str, kind: &'static str) -> Span {
    tracing::info_span!("navigation", id = %id, to = %to, kind = kind)
}
