//! Navigation lifecycle states.
//!
//! ```text
//! Idle → Resolving → Guarding(phase)* → Confirmed | Aborted | Cancelled | Redirecting → Idle
//! ```
//!
//! `Redirecting` loops back to `Resolving` within the same navigation.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Guard phases, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    /// In-view leave guards and record leave guards of leaving records.
    Leave,
    /// Global `before_each` guards.
    GlobalBefore,
    /// In-view update guards and record update guards of reused records.
    Update,
    /// `before_enter` guards of entering records.
    BeforeEnter,
    /// In-view enter guards of entering records.
    ComponentEnter,
    /// Global `before_resolve` guards.
    GlobalResolve,
}

impl GuardPhase {
    pub const ALL: [GuardPhase; 6] = [
        GuardPhase::Leave,
        GuardPhase::GlobalBefore,
        GuardPhase::Update,
        GuardPhase::BeforeEnter,
        GuardPhase::ComponentEnter,
        GuardPhase::GlobalResolve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardPhase::Leave => "leave",
            GuardPhase::GlobalBefore => "global_before",
            GuardPhase::Update => "update",
            GuardPhase::BeforeEnter => "before_enter",
            GuardPhase::ComponentEnter => "component_enter",
            GuardPhase::GlobalResolve => "global_resolve",
        }
    }
}

impl fmt::Display for GuardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a navigation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum NavigationState {
    Idle,
    Resolving,
    Guarding(GuardPhase),
    Confirmed,
    Aborted,
    Cancelled,
    Redirecting,
}

impl NavigationState {
    /// Whether the navigation has settled one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NavigationState::Confirmed | NavigationState::Aborted | NavigationState::Cancelled
        )
    }
}

/// A state change, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationEvent {
    /// ID shared by every event of one navigation, redirects included.
    pub id: Uuid,
    #[serde(flatten)]
    pub state: NavigationState,
    /// Full path of the location being navigated to.
    pub to: String,
}
