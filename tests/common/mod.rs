//! Shared utilities for router integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use nav_router::{GuardError, GuardOutcome, MemoryHistory, RouteLocation, RouteRecordRaw, Router, RouterOptions, View};

/// A router over a fresh in-memory history, with the history handle kept for
/// assertions.
pub fn router() -> (Router, Arc<MemoryHistory>) {
    let history = MemoryHistory::shared("");
    let router = Router::new(RouterOptions::new(history.clone()));
    (router, history)
}

/// A router with a handful of flat routes, already started at `/`.
pub async fn started_router() -> (Router, Arc<MemoryHistory>) {
    let (router, history) = router();
    for (path, name) in [("/", "home"), ("/a", "a"), ("/b", "b"), ("/c", "c")] {
        router
            .add_route(RouteRecordRaw::view(path, View::new(name)).name(name))
            .unwrap();
    }
    router
        .add_route(RouteRecordRaw::view("/users/:id", View::new("User")).name("user"))
        .unwrap();
    assert!(router.start().await.unwrap().is_none());
    (router, history)
}

/// Ordered log of guard and hook calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// A guard that logs `label` and settles with `outcome`.
    pub fn guard(
        &self,
        label: &str,
        outcome: GuardOutcome,
    ) -> impl Fn(Arc<RouteLocation>, Arc<RouteLocation>) -> futures_util::future::Ready<Result<GuardOutcome, GuardError>>
           + Send
           + Sync
           + 'static {
        let log = self.clone();
        let label = label.to_string();
        move |_to, _from| {
            log.push(label.clone());
            futures_util::future::ready(Ok(outcome.clone()))
        }
    }
}
