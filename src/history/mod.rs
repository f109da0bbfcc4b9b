//! Navigation history.
//!
//! # Responsibilities
//! - Define the contract the router drives history through
//! - Report pops (back, forward, go) to listeners
//! - Provide an in-memory implementation
//!
//! # Design Decisions
//! - Methods take `&self`; implementations use interior mutability so one
//!   history can be shared between the router and its listeners
//! - Listeners are called outside any lock so they may call back into the
//!   history

pub mod memory;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::navigation::callbacks::RemoveCallback;
use crate::navigation::scroll::ScrollPosition;

pub use memory::MemoryHistory;

/// How a location was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    Pop,
    Push,
}

/// Direction of a pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationDirection {
    Back,
    Forward,
    Unknown,
}

/// What listeners learn about a pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationInformation {
    pub kind: NavigationType,
    pub direction: NavigationDirection,
    /// Entries actually moved, negative when going back.
    pub delta: i64,
}

/// State stored with each history entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryState {
    pub back: Option<String>,
    pub current: String,
    pub forward: Option<String>,
    pub position: usize,
    pub replaced: bool,
    pub scroll: Option<ScrollPosition>,
    /// Caller data passed with the navigation.
    pub data: Option<serde_json::Value>,
}

/// Called on every pop with `(to, from, info)`.
pub type HistoryListener = Arc<dyn Fn(&str, &str, &NavigationInformation) + Send + Sync>;

/// History the router persists navigations to.
pub trait RouterHistory: Send + Sync {
    /// Base prepended to every location, without trailing slash.
    fn base(&self) -> &str;

    /// Current location, base excluded.
    fn location(&self) -> String;

    /// State of the current entry.
    fn state(&self) -> HistoryState;

    /// Add an entry, dropping any forward entries.
    fn push(&self, to: &str, data: Option<serde_json::Value>);

    /// Swap the current entry. `scroll` is kept in the new entry.
    fn replace(&self, to: &str, data: Option<serde_json::Value>, scroll: Option<ScrollPosition>);

    /// Move by `delta` entries, notifying listeners when `trigger_listeners`
    /// and the position changed. Returns the move actually applied.
    fn go(&self, delta: i64, trigger_listeners: bool) -> i64;

    /// Register a pop listener.
    fn listen(&self, callback: HistoryListener) -> RemoveCallback;

    /// Location as rendered by this history.
    fn create_href(&self, location: &str) -> String {
        create_href(self.base(), location)
    }

    /// Drop every listener.
    fn destroy(&self);
}

/// Ensure a leading slash and remove the trailing one. Hash bases keep
/// their `#`.
pub fn normalize_base(base: &str) -> String {
    if base.is_empty() {
        return String::new();
    }
    let base = if base.starts_with('/') || base.starts_with('#') {
        base.to_string()
    } else {
        format!("/{base}")
    };
    base.trim_end_matches('/').to_string()
}

/// Prepend `base` to `location`, keeping only the hash part of a hash base.
pub fn create_href(base: &str, location: &str) -> String {
    let base = match base.find('#') {
        Some(index) if index > 0 => &base[index..],
        _ => base,
    };
    format!("{base}{location}")
}
