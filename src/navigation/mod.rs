//! Navigation controller.
//!
//! # Data Flow
//! ```text
//! push(raw) / history pop
//!     → resolve (RouteLocation, stored as the pending token)
//!     → redirect record? restart with redirected_from
//!     → duplicate? settle as Duplicated, no guards
//!     → guard phases (leave, before_each, update, before_enter,
//!       component enter, before_resolve)
//!     → finalize (history write, current route, scroll hook)
//!     → after hooks, ready waiters
//! ```
//!
//! # Design Decisions
//! - Only the navigation holding the pending token is live; every other one
//!   settles as `Cancelled` at its next checkpoint and never touches history
//!   or the current route
//! - Record and guard redirects share one counter, bounded by `MAX_REDIRECTS`
//! - No lock is held across an `.await`

pub mod callbacks;
pub mod guards;
pub mod scroll;
pub mod state;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::schema::{RouteConfig, RouterConfig};
use crate::error::{NavigationFailure, NavigationFailureType, RouterError, RouterResult};
use crate::history::{MemoryHistory, NavigationInformation, NavigationType, RouterHistory};
use crate::observability::{metrics, spans};
use crate::routing::encoding::{decode, encode_hash, encode_param};
use crate::routing::location::{
    is_same_route_location, is_same_route_record, parse_url, stringify_url, LocationTarget, RouteLocation,
    RouteLocationRaw, RouteParams,
};
use crate::routing::matcher::{MatcherLocation, RouterMatcher};
use crate::routing::path_parser::PathParserOptions;
use crate::routing::query::{DefaultQueryCodec, QueryCodec};
use crate::routing::record::{RouteId, RouteRecord, RouteRecordRaw, RouteRef};

use callbacks::{CallbackList, RemoveCallback};
use guards::{AfterEachHook, ErrorHandler, GuardOutcome, GuardRef, NavigationGuard};
use scroll::ScrollBehavior;
use state::{GuardPhase, NavigationEvent, NavigationState};

/// Redirects allowed within one navigation.
pub const MAX_REDIRECTS: u32 = 10;

const EVENT_CAPACITY: usize = 64;

/// Settled navigation: `Ok(None)` when it became current.
pub type NavigationResult = RouterResult<Option<NavigationFailure>>;

/// Router construction options.
pub struct RouterOptions {
    pub history: Arc<dyn RouterHistory>,
    /// Defaults for every route pattern.
    pub path_options: PathParserOptions,
    pub query_codec: Arc<dyn QueryCodec>,
    pub scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
}

impl RouterOptions {
    pub fn new(history: Arc<dyn RouterHistory>) -> Self {
        Self {
            history,
            path_options: PathParserOptions::default(),
            query_codec: Arc::new(DefaultQueryCodec),
            scroll_behavior: None,
        }
    }

    pub fn path_options(mut self, options: PathParserOptions) -> Self {
        self.path_options = options;
        self
    }

    pub fn query_codec(mut self, codec: impl QueryCodec + 'static) -> Self {
        self.query_codec = Arc::new(codec);
        self
    }

    pub fn scroll_behavior(mut self, behavior: impl ScrollBehavior + 'static) -> Self {
        self.scroll_behavior = Some(Arc::new(behavior));
        self
    }
}

/// Why a navigation left the guard pipeline early.
enum Interrupt {
    Failure(NavigationFailure),
    Redirect(RouteLocationRaw),
    Error(RouterError),
}

#[derive(Default)]
struct ReadyState {
    ready: bool,
    waiters: Vec<oneshot::Sender<RouterResult<()>>>,
}

struct RouterInner {
    history: Arc<dyn RouterHistory>,
    matcher: RwLock<RouterMatcher>,
    codec: Arc<dyn QueryCodec>,
    scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
    start: Arc<RouteLocation>,
    current: ArcSwap<RouteLocation>,
    pending: ArcSwapOption<RouteLocation>,
    before_guards: CallbackList<GuardRef>,
    before_resolve_guards: CallbackList<GuardRef>,
    after_hooks: CallbackList<AfterEachHook>,
    error_handlers: CallbackList<ErrorHandler>,
    ready: Mutex<ReadyState>,
    settle_waiters: Mutex<Vec<oneshot::Sender<NavigationResult>>>,
    history_listener: Mutex<Option<RemoveCallback>>,
    listening: AtomicBool,
    events: broadcast::Sender<NavigationEvent>,
}

/// Client-side router. Cloning shares the same router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.inner.current.load().full_path)
            .field("routes", &self.inner.matcher.read().len())
            .finish()
    }
}

impl Router {
    pub fn new(options: RouterOptions) -> Self {
        let start = Arc::new(RouteLocation::start());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(RouterInner {
                history: options.history,
                matcher: RwLock::new(RouterMatcher::new(options.path_options)),
                codec: options.query_codec,
                scroll_behavior: options.scroll_behavior,
                current: ArcSwap::new(start.clone()),
                start,
                pending: ArcSwapOption::empty(),
                before_guards: CallbackList::new(),
                before_resolve_guards: CallbackList::new(),
                after_hooks: CallbackList::new(),
                error_handlers: CallbackList::new(),
                ready: Mutex::new(ReadyState::default()),
                settle_waiters: Mutex::new(Vec::new()),
                history_listener: Mutex::new(None),
                listening: AtomicBool::new(true),
                events,
            }),
        }
    }

    /// Build a router over an in-memory history from a validated config.
    pub fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        let options = RouterOptions::new(Arc::new(MemoryHistory::new(&config.history.base)))
            .path_options(config.matching.into());
        let router = Self::new(options);
        router.reload_routes(&config.routes)?;
        Ok(router)
    }

    /// Swap the whole route table for `routes`. On error the previous table
    /// stays in place.
    pub fn reload_routes(&self, routes: &[RouteConfig]) -> RouterResult<()> {
        let options = self.inner.matcher.read().options();
        let mut table = RouterMatcher::new(options);
        for route in routes {
            table.add_route(&route.to_record(), None)?;
        }

        let routes = table.len();
        let mut previous = std::mem::replace(&mut *self.inner.matcher.write(), table);
        previous.clear_routes();
        metrics::record_registered_routes(routes);
        info!(routes, "Route table loaded");
        Ok(())
    }

    pub fn history(&self) -> &Arc<dyn RouterHistory> {
        &self.inner.history
    }

    // ---- registry ----

    /// Register a top-level route.
    pub fn add_route(&self, raw: RouteRecordRaw) -> RouterResult<RouteId> {
        let id = self.inner.matcher.write().add_route(&raw, None)?;
        debug!(path = %raw.path, name = ?raw.name, "Route added");
        Ok(id)
    }

    /// Register `raw` as a child of `parent`, given by name or id.
    pub fn add_child_route<'a>(&self, parent: impl Into<RouteRef<'a>>, raw: RouteRecordRaw) -> RouterResult<RouteId> {
        let parent = parent.into();
        let mut matcher = self.inner.matcher.write();
        let parent_id = matcher.find(parent).ok_or_else(|| RouterError::MatcherNotFound {
            location: parent.to_string(),
        })?;
        let id = matcher.add_route(&raw, Some(parent_id))?;
        debug!(path = %raw.path, parent = %parent, "Child route added");
        Ok(id)
    }

    /// Remove a route, given by name or id, with its children and aliases.
    pub fn remove_route<'a>(&self, route: impl Into<RouteRef<'a>>) -> bool {
        let route = route.into();
        let mut matcher = self.inner.matcher.write();
        match matcher.find(route) {
            Some(id) => {
                matcher.remove_matcher(id);
                true
            }
            None => {
                warn!(route = %route, "Cannot remove non-existent route");
                false
            }
        }
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.inner.matcher.read().has_route(name)
    }

    /// Ranked records.
    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.inner
            .matcher
            .read()
            .get_routes()
            .into_iter()
            .map(|m| m.record().clone())
            .collect()
    }

    pub fn clear_routes(&self) {
        self.inner.matcher.write().clear_routes();
    }

    // ---- resolution ----

    /// Resolve `to` against the current route.
    pub fn resolve(&self, to: impl Into<RouteLocationRaw>) -> RouterResult<RouteLocation> {
        let current = self.current_route();
        self.resolve_from(&to.into(), &current)
    }

    /// Resolve `raw` against `current`.
    pub fn resolve_from(&self, raw: &RouteLocationRaw, current: &RouteLocation) -> RouterResult<RouteLocation> {
        let codec = self.inner.codec.as_ref();
        let matcher_current = MatcherLocation {
            name: current.name.clone(),
            path: current.path.clone(),
            params: encode_params(&current.params),
            matched: current.matched.clone(),
            meta: current.meta.clone(),
        };

        let (matched, query, hash, full_path) = match &raw.target {
            LocationTarget::Path(location) => {
                if !raw.params.is_empty() {
                    warn!(
                        path = %location,
                        "Path was passed with params but they will be ignored; use a named route alongside params instead"
                    );
                }
                let parsed = parse_url(codec, location, &current.path);
                let matched = self.inner.matcher.read().resolve(
                    &LocationTarget::Path(parsed.path.clone()),
                    &RouteParams::new(),
                    &matcher_current,
                )?;

                let overridden = raw.query.is_some() || raw.hash.is_some();
                let query = raw.query.clone().unwrap_or(parsed.query);
                let hash = raw.hash.clone().unwrap_or(parsed.hash);
                let full_path = if overridden {
                    stringify_url(codec, &parsed.path, &query, &encode_hash(&hash))
                } else {
                    parsed.full_path
                };
                (matched, query, hash, full_path)
            }
            target => {
                let matched =
                    self.inner
                        .matcher
                        .read()
                        .resolve(target, &encode_params(&raw.params), &matcher_current)?;
                let query = raw.query.clone().unwrap_or_default();
                let hash = raw.hash.clone().unwrap_or_default();
                let full_path = stringify_url(codec, &matched.path, &query, &encode_hash(&hash));
                (matched, query, hash, full_path)
            }
        };

        Ok(RouteLocation {
            href: self.inner.history.create_href(&full_path),
            full_path,
            path: matched.path,
            name: matched.name,
            params: decode_params(&matched.params),
            query,
            hash,
            matched: matched.matched,
            meta: matched.meta,
            redirected_from: None,
        })
    }

    // ---- state ----

    pub fn current_route(&self) -> Arc<RouteLocation> {
        self.inner.current.load_full()
    }

    /// Location of the latest navigation, settled or not.
    pub fn pending_location(&self) -> Option<Arc<RouteLocation>> {
        self.inner.pending.load_full()
    }

    /// The location held before the first navigation.
    pub fn start_location(&self) -> Arc<RouteLocation> {
        self.inner.start.clone()
    }

    /// Subscribe to navigation state changes.
    pub fn navigation_events(&self) -> broadcast::Receiver<NavigationEvent> {
        self.inner.events.subscribe()
    }

    /// Ignore (`false`) or handle (`true`) history pops.
    pub fn set_listening(&self, listening: bool) {
        self.inner.listening.store(listening, Ordering::SeqCst);
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    // ---- guards and hooks ----

    pub fn before_each(&self, guard: impl NavigationGuard + 'static) -> RemoveCallback {
        self.inner.before_guards.add(Arc::new(guard))
    }

    pub fn before_resolve(&self, guard: impl NavigationGuard + 'static) -> RemoveCallback {
        self.inner.before_resolve_guards.add(Arc::new(guard))
    }

    pub fn after_each<F>(&self, hook: F) -> RemoveCallback
    where
        F: Fn(&RouteLocation, &RouteLocation, Option<&NavigationFailure>) + Send + Sync + 'static,
    {
        self.inner.after_hooks.add(Arc::new(hook))
    }

    pub fn on_error<F>(&self, handler: F) -> RemoveCallback
    where
        F: Fn(&RouterError, &RouteLocation, &RouteLocation) + Send + Sync + 'static,
    {
        self.inner.error_handlers.add(Arc::new(handler))
    }

    // ---- navigation ----

    /// Navigate to the location the history currently holds.
    pub async fn start(&self) -> NavigationResult {
        let location = self.inner.history.location();
        self.push(location).await
    }

    /// Navigate to `to`, adding a history entry.
    pub async fn push(&self, to: impl Into<RouteLocationRaw>) -> NavigationResult {
        let raw = to.into();
        let id = spans::navigation_id();
        let span = spans::navigation_span(id, &raw.to_string(), "push");
        self.push_with_redirect(id, raw, None).instrument(span).await
    }

    /// Navigate to `to`, replacing the current history entry.
    pub async fn replace(&self, to: impl Into<RouteLocationRaw>) -> NavigationResult {
        self.push(to.into().replace(true)).await
    }

    /// Move through history by `delta` and wait for the resulting navigation
    /// to settle.
    pub async fn go(&self, delta: i64) -> NavigationResult {
        self.setup_listeners();
        if !self.is_listening() {
            self.inner.history.go(delta, true);
            return Ok(None);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.settle_waiters.lock().push(tx);
        if self.inner.history.go(delta, true) == 0 {
            debug!(delta, "Nothing to move to in history");
            drop(rx);
            self.inner.settle_waiters.lock().retain(|waiter| !waiter.is_closed());
            return Ok(None);
        }
        rx.await.unwrap_or(Ok(None))
    }

    pub async fn back(&self) -> NavigationResult {
        self.go(-1).await
    }

    pub async fn forward(&self) -> NavigationResult {
        self.go(1).await
    }

    /// Resolves once the first navigation has been confirmed, or fails with
    /// the error that broke it.
    pub async fn is_ready(&self) -> RouterResult<()> {
        let rx = {
            let mut ready = self.inner.ready.lock();
            if ready.ready && !Arc::ptr_eq(&self.current_route(), &self.inner.start) {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            ready.waiters.push(tx);
            rx
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => futures_util::future::pending().await,
        }
    }

    async fn push_with_redirect(
        &self,
        id: Uuid,
        mut raw: RouteLocationRaw,
        mut redirected_from: Option<Arc<RouteLocation>>,
    ) -> NavigationResult {
        let started = Instant::now();
        let mut redirects: u32 = 0;

        loop {
            let from = self.current_route();
            let target = self.resolve_from(&raw, &from)?;
            let to = Arc::new(RouteLocation {
                redirected_from: redirected_from.clone(),
                ..target
            });
            self.inner.pending.store(Some(to.clone()));
            self.emit(id, NavigationState::Resolving, &to);

            if let Some(redirect) = to.leaf().and_then(|record| record.redirect()) {
                let next = redirect_location(&to, redirect.target(&to));
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    let error = infinite_redirect(&from, &to, redirects);
                    return self.fail(id, started, error, &to, &from);
                }
                debug!(from = %to.full_path, to = %next, "Following redirect record");
                self.emit(id, NavigationState::Redirecting, &to);
                raw = carry_options(&raw, next);
                redirected_from.get_or_insert(to);
                continue;
            }

            let is_first = Arc::ptr_eq(&from, &self.inner.start);
            if !raw.force && !is_first && is_same_route_location(self.inner.codec.as_ref(), &from, &to) {
                let failure = NavigationFailure::new(NavigationFailureType::Duplicated, to.clone(), from.clone());
                debug!(to = %to.full_path, "Duplicated navigation");
                self.handle_scroll(&from, &from, true, false);
                self.settle(id, started, &to, Some(&failure));
                self.trigger_after_each(&to, &from, Some(&failure));
                return Ok(Some(failure));
            }

            let failure = match self.navigate(id, &to, &from).await {
                Ok(()) => {
                    self.finalize_navigation(&to, &from, true, raw.replace, raw.state.clone())
                        .await
                }
                Err(Interrupt::Failure(failure)) => Some(failure),
                Err(Interrupt::Redirect(next)) => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        let error = infinite_redirect(&from, &to, redirects);
                        return self.fail(id, started, error, &to, &from);
                    }
                    debug!(from = %to.full_path, to = %next, "Guard redirected navigation");
                    self.emit(id, NavigationState::Redirecting, &to);
                    raw = carry_options(&raw, next);
                    redirected_from.get_or_insert(to);
                    continue;
                }
                Err(Interrupt::Error(error)) => return self.fail(id, started, error, &to, &from),
            };

            self.settle(id, started, &to, failure.as_ref());
            self.trigger_after_each(&to, &from, failure.as_ref());
            if failure.is_none() {
                self.mark_as_ready(None);
            }
            return Ok(failure);
        }
    }

    /// Run the six guard phases.
    async fn navigate(&self, id: Uuid, to: &Arc<RouteLocation>, from: &Arc<RouteLocation>) -> Result<(), Interrupt> {
        let (leaving, updating, entering) = extract_changing_records(to, from);

        let mut guards: Vec<GuardRef> = leaving
            .iter()
            .rev()
            .flat_map(|record| record.components().values().filter_map(|view| view.leave_guard()))
            .collect();
        guards.extend(leaving.iter().rev().flat_map(|record| record.leave_guards()));
        self.run_phase(id, GuardPhase::Leave, guards, to, from).await?;

        let guards = self.inner.before_guards.list();
        self.run_phase(id, GuardPhase::GlobalBefore, guards, to, from).await?;

        let mut guards: Vec<GuardRef> = updating
            .iter()
            .flat_map(|record| record.components().values().filter_map(|view| view.update_guard()))
            .collect();
        guards.extend(updating.iter().flat_map(|record| record.update_guards()));
        self.run_phase(id, GuardPhase::Update, guards, to, from).await?;

        let guards: Vec<GuardRef> = entering
            .iter()
            .flat_map(|record| record.before_enter().iter().cloned())
            .collect();
        self.run_phase(id, GuardPhase::BeforeEnter, guards, to, from).await?;

        for record in &to.matched {
            record.clear_enter_callbacks();
        }
        let guards: Vec<GuardRef> = entering
            .iter()
            .flat_map(|record| record.components().values().filter_map(|view| view.enter_guard()))
            .collect();
        self.run_phase(id, GuardPhase::ComponentEnter, guards, to, from).await?;

        let guards = self.inner.before_resolve_guards.list();
        self.run_phase(id, GuardPhase::GlobalResolve, guards, to, from).await
    }

    async fn run_phase(
        &self,
        id: Uuid,
        phase: GuardPhase,
        guards: Vec<GuardRef>,
        to: &Arc<RouteLocation>,
        from: &Arc<RouteLocation>,
    ) -> Result<(), Interrupt> {
        self.ensure_current(to, from)?;
        self.emit(id, NavigationState::Guarding(phase), to);

        for guard in guards {
            metrics::record_guard(phase.as_str());
            let outcome = guard.check(to.clone(), from.clone()).await;
            // a newer navigation wins over whatever the guard decided
            self.ensure_current(to, from)?;

            match outcome {
                Ok(GuardOutcome::Continue) => {}
                Ok(GuardOutcome::Abort) => {
                    debug!(phase = %phase, to = %to.full_path, "Navigation aborted by guard");
                    return Err(Interrupt::Failure(NavigationFailure::new(
                        NavigationFailureType::Aborted,
                        to.clone(),
                        from.clone(),
                    )));
                }
                Ok(GuardOutcome::Redirect(target)) => return Err(Interrupt::Redirect(target)),
                Err(error) => return Err(Interrupt::Error(RouterError::Guard(Arc::from(error)))),
            }
        }
        Ok(())
    }

    fn is_live(&self, to: &Arc<RouteLocation>) -> bool {
        self.inner
            .pending
            .load()
            .as_ref()
            .is_some_and(|pending| Arc::ptr_eq(pending, to))
    }

    fn check_cancelled(&self, to: &Arc<RouteLocation>, from: &Arc<RouteLocation>) -> Option<NavigationFailure> {
        if self.is_live(to) {
            return None;
        }
        debug!(to = %to.full_path, "Navigation cancelled by a newer navigation");
        Some(NavigationFailure::new(
            NavigationFailureType::Cancelled,
            to.clone(),
            from.clone(),
        ))
    }

    fn ensure_current(&self, to: &Arc<RouteLocation>, from: &Arc<RouteLocation>) -> Result<(), Interrupt> {
        match self.check_cancelled(to, from) {
            Some(failure) => Err(Interrupt::Failure(failure)),
            None => Ok(()),
        }
    }

    /// Make `to` current. Returns a failure if a newer navigation started.
    async fn finalize_navigation(
        &self,
        to: &Arc<RouteLocation>,
        from: &Arc<RouteLocation>,
        is_push: bool,
        replace: bool,
        data: Option<serde_json::Value>,
    ) -> Option<NavigationFailure> {
        if let Some(failure) = self.check_cancelled(to, from) {
            return Some(failure);
        }

        let is_first = Arc::ptr_eq(from, &self.inner.start);
        if is_push {
            if replace || is_first {
                let scroll = if is_first {
                    self.inner.history.state().scroll
                } else {
                    None
                };
                self.inner.history.replace(&to.full_path, data, scroll);
            } else {
                self.inner.history.push(&to.full_path, data);
            }
        }

        self.inner.current.store(to.clone());
        info!(from = %from.full_path, to = %to.full_path, name = ?to.name, "Navigation confirmed");
        tokio::task::yield_now().await;
        self.handle_scroll(to, from, is_push, is_first);
        None
    }

    fn handle_scroll(&self, to: &RouteLocation, from: &RouteLocation, is_push: bool, is_first: bool) {
        let Some(behavior) = &self.inner.scroll_behavior else {
            return;
        };
        let saved = if !is_push || is_first {
            self.inner.history.state().scroll
        } else {
            None
        };
        behavior.scroll(to, from, saved);
    }

    fn emit(&self, id: Uuid, state: NavigationState, to: &Arc<RouteLocation>) {
        if !state.is_terminal() && !self.is_live(to) {
            return;
        }
        let _ = self.inner.events.send(NavigationEvent {
            id,
            state,
            to: to.full_path.clone(),
        });
    }

    /// Record the outcome and broadcast the terminal state, then `Idle` if
    /// no newer navigation took over.
    fn settle(&self, id: Uuid, started: Instant, to: &Arc<RouteLocation>, failure: Option<&NavigationFailure>) {
        let (state, outcome) = match failure.map(|failure| failure.kind) {
            None => (Some(NavigationState::Confirmed), "confirmed"),
            Some(NavigationFailureType::Aborted) => (Some(NavigationState::Aborted), "aborted"),
            Some(NavigationFailureType::Cancelled) => (Some(NavigationState::Cancelled), "cancelled"),
            Some(NavigationFailureType::Duplicated) => (None, "duplicated"),
        };
        metrics::record_navigation(outcome, started);
        if let Some(state) = state {
            self.emit(id, state, to);
        }
        self.emit(id, NavigationState::Idle, to);
    }

    fn fail(
        &self,
        id: Uuid,
        started: Instant,
        error: RouterError,
        to: &Arc<RouteLocation>,
        from: &Arc<RouteLocation>,
    ) -> NavigationResult {
        metrics::record_navigation("error", started);
        self.emit(id, NavigationState::Idle, to);
        self.trigger_error(error, to, from)
    }

    fn trigger_after_each(&self, to: &RouteLocation, from: &RouteLocation, failure: Option<&NavigationFailure>) {
        for hook in self.inner.after_hooks.list() {
            hook(to, from, failure);
        }
        self.notify_settle_waiters(Ok(failure.cloned()));
    }

    fn trigger_error(&self, error: RouterError, to: &RouteLocation, from: &RouteLocation) -> NavigationResult {
        self.mark_as_ready(Some(&error));

        let handlers = self.inner.error_handlers.list();
        if handlers.is_empty() {
            tracing::error!(error = %error, to = %to.full_path, from = %from.full_path, "uncaught error during route navigation");
        } else {
            for handler in handlers {
                handler(&error, to, from);
            }
        }
        self.notify_settle_waiters(Err(error.clone()));
        Err(error)
    }

    fn notify_settle_waiters(&self, result: NavigationResult) {
        let waiters = std::mem::take(&mut *self.inner.settle_waiters.lock());
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    fn mark_as_ready(&self, error: Option<&RouterError>) {
        let waiters = {
            let mut ready = self.inner.ready.lock();
            if ready.ready {
                return;
            }
            ready.ready = error.is_none();
            std::mem::take(&mut ready.waiters)
        };

        self.setup_listeners();
        for waiter in waiters {
            let _ = waiter.send(match error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            });
        }
    }

    /// Install the history listener once.
    fn setup_listeners(&self) {
        let mut slot = self.inner.history_listener.lock();
        if slot.is_some() {
            return;
        }

        let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let handle = self.inner.history.listen(Arc::new(
            move |to: &str, _from: &str, info: &NavigationInformation| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let router = Router { inner };
                if !router.is_listening() {
                    return;
                }
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    warn!(to = %to, "History pop outside of a tokio runtime, ignored");
                    return;
                };

                let id = spans::navigation_id();
                let span = spans::navigation_span(id, to, "pop");
                let to = to.to_string();
                let info = *info;
                runtime.spawn(async move { router.handle_pop(id, to, info).await }.instrument(span));
            },
        ));
        *slot = Some(handle);
        debug!("History listener installed");
    }

    async fn handle_pop(&self, id: Uuid, to_path: String, info: NavigationInformation) {
        let started = Instant::now();
        let from = self.current_route();
        let to = match self.resolve_from(&RouteLocationRaw::path(to_path.as_str()), &from) {
            Ok(location) => Arc::new(location),
            Err(error) => {
                warn!(to = %to_path, error = %error, "Cannot resolve popped location");
                self.notify_settle_waiters(Err(error));
                return;
            }
        };

        if let Some(redirect) = to.leaf().and_then(|record| record.redirect()) {
            let next = redirect_location(&to, redirect.target(&to)).replace(true).force(true);
            if let Err(error) = self.push_with_redirect(id, next, Some(to.clone())).await {
                warn!(from = %to.full_path, error = %error, "Redirect of popped location failed");
                self.notify_settle_waiters(Err(error));
            }
            return;
        }

        self.inner.pending.store(Some(to.clone()));
        self.emit(id, NavigationState::Resolving, &to);

        let failure = match self.navigate(id, &to, &from).await {
            Ok(()) => self.finalize_navigation(&to, &from, false, false, None).await,
            Err(Interrupt::Failure(failure)) => Some(failure),
            Err(Interrupt::Redirect(next)) => {
                self.emit(id, NavigationState::Redirecting, &to);
                let result = self.push_with_redirect(id, next.force(true), Some(to.clone())).await;
                if let Err(error) = &result {
                    warn!(from = %to.full_path, error = %error, "Guard redirect of popped location failed");
                    self.notify_settle_waiters(Err(error.clone()));
                }
                if let Ok(Some(failure)) = &result {
                    let undone = matches!(
                        failure.kind,
                        NavigationFailureType::Aborted | NavigationFailureType::Duplicated
                    );
                    if undone && info.delta == 0 && info.kind == NavigationType::Pop {
                        self.inner.history.go(-1, false);
                    }
                }
                return;
            }
            Err(Interrupt::Error(error)) => {
                if info.delta != 0 {
                    self.inner.history.go(-info.delta, false);
                }
                let _ = self.fail(id, started, error, &to, &from);
                return;
            }
        };

        if let Some(failure) = &failure {
            if info.delta != 0 && !failure.is(NavigationFailureType::Cancelled) {
                debug!(delta = info.delta, "Rolling back history after failed pop");
                self.inner.history.go(-info.delta, false);
            } else if info.kind == NavigationType::Pop
                && matches!(
                    failure.kind,
                    NavigationFailureType::Aborted | NavigationFailureType::Duplicated
                )
            {
                self.inner.history.go(-1, false);
            }
        }

        self.settle(id, started, &to, failure.as_ref());
        self.trigger_after_each(&to, &from, failure.as_ref());
        if failure.is_none() {
            self.mark_as_ready(None);
        }
    }
}

/// Split the records of `from` and `to` into leaving, updating and entering.
/// Aliases count as their canonical record.
pub fn extract_changing_records(
    to: &RouteLocation,
    from: &RouteLocation,
) -> (Vec<Arc<RouteRecord>>, Vec<Arc<RouteRecord>>, Vec<Arc<RouteRecord>>) {
    let mut leaving = Vec::new();
    let mut updating = Vec::new();
    let mut entering = Vec::new();

    let len = from.matched.len().max(to.matched.len());
    for index in 0..len {
        if let Some(record_from) = from.matched.get(index) {
            if to.matched.iter().any(|record| is_same_route_record(record, record_from)) {
                updating.push(record_from.clone());
            } else {
                leaving.push(record_from.clone());
            }
        }
        if let Some(record_to) = to.matched.get(index) {
            if !from.matched.iter().any(|record| is_same_route_record(record, record_to)) {
                entering.push(record_to.clone());
            }
        }
    }
    (leaving, updating, entering)
}

/// Target of a redirect record: inherits the query and hash of `to`, and
/// its params unless the target is a path.
fn redirect_location(to: &RouteLocation, mut next: RouteLocationRaw) -> RouteLocationRaw {
    let (has_query, has_hash) = match &next.target {
        LocationTarget::Path(path) => {
            next.params.clear();
            (path.contains('?'), path.contains('#'))
        }
        _ => {
            if next.params.is_empty() {
                next.params = to.params.clone();
            }
            (false, false)
        }
    };
    if next.query.is_none() && !has_query {
        next.query = Some(to.query.clone());
    }
    if next.hash.is_none() && !has_hash {
        next.hash = Some(to.hash.clone());
    }
    next
}

/// Carry `replace`, `force` and history data of `previous` into a redirect
/// target.
fn carry_options(previous: &RouteLocationRaw, mut next: RouteLocationRaw) -> RouteLocationRaw {
    next.replace = next.replace || previous.replace;
    next.force = previous.force;
    next.state = match (previous.state.clone(), next.state.take()) {
        (Some(serde_json::Value::Object(mut base)), Some(serde_json::Value::Object(extra))) => {
            base.extend(extra);
            Some(serde_json::Value::Object(base))
        }
        (previous, next) => next.or(previous),
    };
    next
}

fn infinite_redirect(from: &RouteLocation, to: &RouteLocation, count: u32) -> RouterError {
    RouterError::InfiniteRedirect {
        from: from.full_path.clone(),
        to: to.full_path.clone(),
        count,
    }
}

fn encode_params(params: &RouteParams) -> RouteParams {
    params
        .iter()
        .map(|(key, value)| (key.clone(), value.map(encode_param)))
        .collect()
}

fn decode_params(params: &RouteParams) -> RouteParams {
    params
        .iter()
        .map(|(key, value)| (key.clone(), value.map(decode)))
        .collect()
}
