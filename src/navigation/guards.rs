//! Navigation guards and hooks.
//!
//! A guard settles with one of four signals:
//! - `Ok(GuardOutcome::Continue)`: allow the navigation
//! - `Ok(GuardOutcome::Abort)`: refuse it, the navigation fails as aborted
//! - `Ok(GuardOutcome::Redirect(target))`: restart towards `target`
//! - `Err(error)`: unexpected failure, the navigation is rejected
//!
//! Async closures taking `(to, from)` are guards; `guard_fn` adapts
//! synchronous ones.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::{NavigationFailure, RouterError};
use crate::routing::location::{RouteLocation, RouteLocationRaw};

/// Error type a guard may fail with.
pub type GuardError = Box<dyn std::error::Error + Send + Sync>;

/// What a guard settles with.
pub type GuardResult = Result<GuardOutcome, GuardError>;

/// A guard's verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Continue,
    Abort,
    Redirect(RouteLocationRaw),
}

impl From<bool> for GuardOutcome {
    fn from(allow: bool) -> Self {
        if allow {
            GuardOutcome::Continue
        } else {
            GuardOutcome::Abort
        }
    }
}

impl From<RouteLocationRaw> for GuardOutcome {
    fn from(target: RouteLocationRaw) -> Self {
        GuardOutcome::Redirect(target)
    }
}

impl From<&str> for GuardOutcome {
    fn from(path: &str) -> Self {
        GuardOutcome::Redirect(RouteLocationRaw::path(path))
    }
}

/// A check run before a navigation is accepted.
#[async_trait]
pub trait NavigationGuard: Send + Sync {
    async fn check(&self, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> GuardResult;
}

#[async_trait]
impl<F, Fut> NavigationGuard for F
where
    F: Fn(Arc<RouteLocation>, Arc<RouteLocation>) -> Fut + Send + Sync,
    Fut: Future<Output = GuardResult> + Send + 'static,
{
    async fn check(&self, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> GuardResult {
        (self)(to, from).await
    }
}

/// Shared handle to a guard.
pub type GuardRef = Arc<dyn NavigationGuard>;

/// Adapter for synchronous guard closures.
pub struct SyncGuard<F>(F);

/// Wrap a synchronous closure as a guard.
pub fn guard_fn<F>(f: F) -> SyncGuard<F>
where
    F: Fn(&RouteLocation, &RouteLocation) -> GuardResult + Send + Sync,
{
    SyncGuard(f)
}

#[async_trait]
impl<F> NavigationGuard for SyncGuard<F>
where
    F: Fn(&RouteLocation, &RouteLocation) -> GuardResult + Send + Sync,
{
    async fn check(&self, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> GuardResult {
        (self.0)(&to, &from)
    }
}

/// Informational hook run after every settled navigation.
pub type AfterEachHook = Arc<dyn Fn(&RouteLocation, &RouteLocation, Option<&NavigationFailure>) + Send + Sync>;

/// Receives unexpected navigation errors.
pub type ErrorHandler = Arc<dyn Fn(&RouterError, &RouteLocation, &RouteLocation) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_async_closure_guard() {
        let guard = |to: Arc<RouteLocation>, _from: Arc<RouteLocation>| async move {
            Ok::<_, GuardError>(GuardOutcome::from(to.path != "/private"))
        };
        let start = Arc::new(RouteLocation::start());
        assert_eq!(guard.check(start.clone(), start.clone()).await.unwrap(), GuardOutcome::Continue);

        let private = Arc::new(RouteLocation {
            path: "/private".into(),
            ..RouteLocation::start()
        });
        assert_eq!(guard.check(private, start).await.unwrap(), GuardOutcome::Abort);
    }

    #[tokio::test]
    async fn test_sync_guard() {
        let guard = guard_fn(|_to, _from| Ok("/login".into()));
        let start = Arc::new(RouteLocation::start());
        assert_eq!(
            guard.check(start.clone(), start).await.unwrap(),
            GuardOutcome::Redirect(RouteLocationRaw::path("/login"))
        );
    }
}
