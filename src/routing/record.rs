//! Route definitions and their normalized form.
//!
//! # Responsibilities
//! - `RouteRecordRaw`: what callers register, one of four content forms
//! - `RouteRecord`: the normalized record a matcher owns, one per path
//!   (canonical or alias)
//! - Runtime guard lists filled by mounted views
//!
//! # Design Decisions
//! - Content forms are a closed enum, checked once at registration
//! - Aliases get their own record sharing the canonical views and runtime
//!   guards; `alias_of` points back to the canonical record id

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RouterError, RouterResult};
use crate::navigation::callbacks::{CallbackList, RemoveCallback};
use crate::navigation::guards::{GuardRef, NavigationGuard};
use crate::routing::location::{RouteLocation, RouteLocationRaw};
use crate::routing::path_parser::PathParserOptions;

/// Arbitrary route metadata.
pub type RouteMeta = serde_json::Map<String, serde_json::Value>;

/// Slot name used by single-view records.
pub const DEFAULT_VIEW: &str = "default";

/// Stable identifier of a registered record and its matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub(crate) u64);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

/// A registered route, by name or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRef<'a> {
    Name(&'a str),
    Id(RouteId),
}

impl<'a> From<&'a str> for RouteRef<'a> {
    fn from(name: &'a str) -> Self {
        RouteRef::Name(name)
    }
}

impl<'a> From<&'a String> for RouteRef<'a> {
    fn from(name: &'a String) -> Self {
        RouteRef::Name(name)
    }
}

impl From<RouteId> for RouteRef<'_> {
    fn from(id: RouteId) -> Self {
        RouteRef::Id(id)
    }
}

impl fmt::Display for RouteRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteRef::Name(name) => write!(f, "{{\"name\":\"{name}\"}}"),
            RouteRef::Id(id) => write!(f, "{id}"),
        }
    }
}

/// An opaque view rendered for a route, with its in-view guards.
#[derive(Clone)]
pub struct View {
    name: String,
    before_route_enter: Option<GuardRef>,
    before_route_update: Option<GuardRef>,
    before_route_leave: Option<GuardRef>,
}

impl View {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_route_enter: None,
            before_route_update: None,
            before_route_leave: None,
        }
    }

    /// Guard run when a route showing this view is entered.
    pub fn before_route_enter(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_enter = Some(Arc::new(guard));
        self
    }

    /// Guard run when the route stays but its location changes.
    pub fn before_route_update(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_update = Some(Arc::new(guard));
        self
    }

    /// Guard run when the route is left.
    pub fn before_route_leave(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_leave = Some(Arc::new(guard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enter_guard(&self) -> Option<GuardRef> {
        self.before_route_enter.clone()
    }

    pub(crate) fn update_guard(&self) -> Option<GuardRef> {
        self.before_route_update.clone()
    }

    pub(crate) fn leave_guard(&self) -> Option<GuardRef> {
        self.before_route_leave.clone()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("before_route_enter", &self.before_route_enter.is_some())
            .field("before_route_update", &self.before_route_update.is_some())
            .field("before_route_leave", &self.before_route_leave.is_some())
            .finish()
    }
}

/// Where a redirect record sends navigations.
#[derive(Clone)]
pub enum RouteRedirect {
    To(RouteLocationRaw),
    /// Computed from the location being redirected.
    With(Arc<dyn Fn(&RouteLocation) -> RouteLocationRaw + Send + Sync>),
}

impl RouteRedirect {
    pub fn target(&self, to: &RouteLocation) -> RouteLocationRaw {
        match self {
            RouteRedirect::To(target) => target.clone(),
            RouteRedirect::With(f) => f(to),
        }
    }
}

impl fmt::Debug for RouteRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteRedirect::To(target) => f.debug_tuple("To").field(target).finish(),
            RouteRedirect::With(_) => f.write_str("With(..)"),
        }
    }
}

/// How a view receives props from its location.
#[derive(Clone)]
pub enum RouteProps {
    /// The route params.
    Params,
    /// A fixed object.
    Static(serde_json::Map<String, serde_json::Value>),
    /// Computed from the location.
    With(Arc<dyn Fn(&RouteLocation) -> serde_json::Map<String, serde_json::Value> + Send + Sync>),
}

impl fmt::Debug for RouteProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteProps::Params => f.write_str("Params"),
            RouteProps::Static(map) => f.debug_tuple("Static").field(map).finish(),
            RouteProps::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Props declared on a raw record.
#[derive(Debug, Clone, Default)]
pub enum PropsOption {
    #[default]
    None,
    /// Same mapping for every view.
    All(RouteProps),
    /// Mapping per view slot.
    PerView(BTreeMap<String, RouteProps>),
}

/// The four mutually exclusive forms of a route definition.
#[derive(Debug, Clone)]
pub enum RouteContent {
    /// A single view in the default slot.
    Component(View),
    /// Views keyed by slot name.
    Components(BTreeMap<String, View>),
    /// Redirect elsewhere; renders nothing.
    Redirect(RouteRedirect),
    /// Nested routes, with optional layout views.
    Nested {
        components: BTreeMap<String, View>,
        children: Vec<RouteRecordRaw>,
    },
}

/// A route definition as registered by callers.
#[derive(Clone)]
pub struct RouteRecordRaw {
    pub path: String,
    pub name: Option<String>,
    pub content: RouteContent,
    pub alias: Vec<String>,
    pub before_enter: Vec<GuardRef>,
    pub props: PropsOption,
    pub meta: RouteMeta,
    pub sensitive: Option<bool>,
    pub strict: Option<bool>,
    pub end: Option<bool>,
}

impl RouteRecordRaw {
    pub fn new(path: impl Into<String>, content: RouteContent) -> Self {
        Self {
            path: path.into(),
            name: None,
            content,
            alias: Vec::new(),
            before_enter: Vec::new(),
            props: PropsOption::None,
            meta: RouteMeta::new(),
            sensitive: None,
            strict: None,
            end: None,
        }
    }

    /// A route rendering one view.
    pub fn view(path: impl Into<String>, view: View) -> Self {
        Self::new(path, RouteContent::Component(view))
    }

    /// A route rendering named views.
    pub fn views(path: impl Into<String>, views: BTreeMap<String, View>) -> Self {
        Self::new(path, RouteContent::Components(views))
    }

    /// A route redirecting to a fixed target.
    pub fn redirect(path: impl Into<String>, target: impl Into<RouteLocationRaw>) -> Self {
        Self::new(path, RouteContent::Redirect(RouteRedirect::To(target.into())))
    }

    /// A route redirecting to a target computed from the location.
    pub fn redirect_with<F>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RouteLocation) -> RouteLocationRaw + Send + Sync + 'static,
    {
        Self::new(path, RouteContent::Redirect(RouteRedirect::With(Arc::new(f))))
    }

    /// A route grouping `children`.
    pub fn nested(path: impl Into<String>, children: Vec<RouteRecordRaw>) -> Self {
        Self::new(
            path,
            RouteContent::Nested {
                components: BTreeMap::new(),
                children,
            },
        )
    }

    /// Layout view of a nested route.
    pub fn layout(self, view: View) -> Self {
        self.layout_view(DEFAULT_VIEW, view)
    }

    /// Named layout view of a nested route. Ignored on other forms.
    pub fn layout_view(mut self, slot: impl Into<String>, view: View) -> Self {
        if let RouteContent::Nested { components, .. } = &mut self.content {
            components.insert(slot.into(), view);
        }
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn before_enter(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_enter.push(Arc::new(guard));
        self
    }

    pub fn props(mut self, props: RouteProps) -> Self {
        self.props = PropsOption::All(props);
        self
    }

    pub fn view_props(mut self, slot: impl Into<String>, props: RouteProps) -> Self {
        let mut per_view = match std::mem::take(&mut self.props) {
            PropsOption::PerView(map) => map,
            _ => BTreeMap::new(),
        };
        per_view.insert(slot.into(), props);
        self.props = PropsOption::PerView(per_view);
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = Some(sensitive);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn end(mut self, end: bool) -> Self {
        self.end = Some(end);
        self
    }

    pub fn children(&self) -> &[RouteRecordRaw] {
        match &self.content {
            RouteContent::Nested { children, .. } => children,
            _ => &[],
        }
    }

    /// Views keyed by slot.
    pub fn components(&self) -> BTreeMap<String, View> {
        match &self.content {
            RouteContent::Component(view) => BTreeMap::from([(DEFAULT_VIEW.to_string(), view.clone())]),
            RouteContent::Components(views) => views.clone(),
            RouteContent::Nested { components, .. } => components.clone(),
            RouteContent::Redirect(_) => BTreeMap::new(),
        }
    }

    pub fn redirect_target(&self) -> Option<&RouteRedirect> {
        match &self.content {
            RouteContent::Redirect(redirect) => Some(redirect),
            _ => None,
        }
    }

    /// Matching options, record overrides first.
    pub fn path_options(&self, defaults: &PathParserOptions) -> PathParserOptions {
        PathParserOptions {
            sensitive: self.sensitive.unwrap_or(defaults.sensitive),
            strict: self.strict.unwrap_or(defaults.strict),
            end: self.end.unwrap_or(defaults.end),
        }
    }

    /// Reject definitions the content forms cannot express.
    pub fn validate(&self) -> RouterResult<()> {
        let invalid = |reason: &str| RouterError::InvalidRecord {
            path: self.path.clone(),
            reason: reason.to_string(),
        };

        if self.path == "*" {
            return Err(invalid(
                "Catch all routes (\"*\") must be defined using a param with a custom regexp, e.g. \"/:path(.*)*\"",
            ));
        }
        match &self.content {
            RouteContent::Components(views) if views.is_empty() => {
                return Err(invalid("a route with named views needs at least one view"));
            }
            RouteContent::Redirect(_) if !matches!(self.props, PropsOption::None) => {
                return Err(invalid("a redirect route cannot declare props"));
            }
            _ => {}
        }
        if let PropsOption::PerView(map) = &self.props {
            let components = self.components();
            if let Some(slot) = map.keys().find(|slot| !components.contains_key(*slot)) {
                return Err(invalid(&format!("props declared for unknown view \"{slot}\"")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RouteRecordRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecordRaw")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("content", &self.content)
            .field("alias", &self.alias)
            .field("before_enter", &self.before_enter.len())
            .field("props", &self.props)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Deferred work queued by an enter guard for the view once it is mounted.
pub type EnterCallback = Box<dyn FnOnce() + Send>;

/// Guards and callbacks registered at runtime by mounted views. Shared by a
/// canonical record and its aliases.
#[derive(Default)]
struct RuntimeGuards {
    leave: CallbackList<GuardRef>,
    update: CallbackList<GuardRef>,
    enter_callbacks: Mutex<BTreeMap<String, Vec<EnterCallback>>>,
}

/// A normalized route record.
pub struct RouteRecord {
    id: RouteId,
    path: String,
    name: Option<String>,
    components: BTreeMap<String, View>,
    redirect: Option<RouteRedirect>,
    before_enter: Vec<GuardRef>,
    props: BTreeMap<String, RouteProps>,
    meta: RouteMeta,
    alias_of: Option<RouteId>,
    runtime: Arc<RuntimeGuards>,
}

impl RouteRecord {
    /// Normalize `raw` under its final (joined) `path`. An alias passes the
    /// canonical record it copies.
    pub(crate) fn normalize(raw: &RouteRecordRaw, id: RouteId, path: String, original: Option<&RouteRecord>) -> Self {
        let components = raw.components();
        let props = match &raw.props {
            PropsOption::None => BTreeMap::new(),
            PropsOption::All(props) => components
                .keys()
                .map(|slot| (slot.clone(), props.clone()))
                .collect(),
            PropsOption::PerView(map) => map.clone(),
        };

        Self {
            id,
            path,
            name: raw.name.clone(),
            components,
            redirect: raw.redirect_target().cloned(),
            before_enter: raw.before_enter.clone(),
            props,
            meta: raw.meta.clone(),
            alias_of: original.map(|original| original.id),
            runtime: original.map(|original| original.runtime.clone()).unwrap_or_default(),
        }
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Id of the canonical record; aliases resolve to their original.
    pub fn canonical_id(&self) -> RouteId {
        self.alias_of.unwrap_or(self.id)
    }

    pub fn alias_of(&self) -> Option<RouteId> {
        self.alias_of
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn components(&self) -> &BTreeMap<String, View> {
        &self.components
    }

    pub fn redirect(&self) -> Option<&RouteRedirect> {
        self.redirect.as_ref()
    }

    pub fn before_enter(&self) -> &[GuardRef] {
        &self.before_enter
    }

    pub fn meta(&self) -> &RouteMeta {
        &self.meta
    }

    /// A record is matchable when it renders, redirects or is named.
    pub fn is_matchable(&self) -> bool {
        self.name.is_some() || !self.components.is_empty() || self.redirect.is_some()
    }

    /// Register a leave guard on behalf of a mounted view.
    pub fn add_leave_guard(&self, guard: impl NavigationGuard + 'static) -> RemoveCallback {
        self.runtime.leave.add(Arc::new(guard))
    }

    /// Register an update guard on behalf of a mounted view.
    pub fn add_update_guard(&self, guard: impl NavigationGuard + 'static) -> RemoveCallback {
        self.runtime.update.add(Arc::new(guard))
    }

    pub fn leave_guards(&self) -> Vec<GuardRef> {
        self.runtime.leave.list()
    }

    pub fn update_guards(&self) -> Vec<GuardRef> {
        self.runtime.update.list()
    }

    /// Queue `callback` for the view in `slot`.
    pub fn on_enter(&self, slot: impl Into<String>, callback: impl FnOnce() + Send + 'static) {
        self.runtime
            .enter_callbacks
            .lock()
            .entry(slot.into())
            .or_default()
            .push(Box::new(callback));
    }

    /// Drain the callbacks queued for `slot`, for the view that just mounted.
    pub fn take_enter_callbacks(&self, slot: &str) -> Vec<EnterCallback> {
        self.runtime.enter_callbacks.lock().remove(slot).unwrap_or_default()
    }

    pub(crate) fn clear_enter_callbacks(&self) {
        self.runtime.enter_callbacks.lock().clear();
    }

    pub(crate) fn clear_runtime_guards(&self) {
        self.runtime.leave.reset();
        self.runtime.update.reset();
        self.clear_enter_callbacks();
    }

    /// Props for the view in `slot`, or `None` when props are disabled.
    pub fn resolve_props(&self, slot: &str, location: &RouteLocation) -> Option<serde_json::Map<String, serde_json::Value>> {
        match self.props.get(slot)? {
            RouteProps::Params => Some(
                location
                    .params
                    .iter()
                    .map(|(key, value)| {
                        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            RouteProps::Static(map) => Some(map.clone()),
            RouteProps::With(f) => Some(f(location)),
        }
    }
}

impl fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecord")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("redirect", &self.redirect)
            .field("alias_of", &self.alias_of)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::guards::{guard_fn, GuardOutcome};
    use crate::routing::location::ParamValue;

    #[test]
    fn test_validate_forms() {
        assert!(RouteRecordRaw::view("/", View::new("Home")).validate().is_ok());
        assert!(matches!(
            RouteRecordRaw::views("/", BTreeMap::new()).validate(),
            Err(RouterError::InvalidRecord { .. })
        ));
        assert!(matches!(
            RouteRecordRaw::redirect("/old", "/new").props(RouteProps::Params).validate(),
            Err(RouterError::InvalidRecord { .. })
        ));
        assert!(matches!(
            RouteRecordRaw::view("*", View::new("NotFound")).validate(),
            Err(RouterError::InvalidRecord { .. })
        ));
        assert!(matches!(
            RouteRecordRaw::view("/", View::new("Home"))
                .view_props("sidebar", RouteProps::Params)
                .validate(),
            Err(RouterError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_normalize_props() {
        let raw = RouteRecordRaw::view("/users/:id", View::new("User")).props(RouteProps::Params);
        let record = RouteRecord::normalize(&raw, RouteId(1), raw.path.clone(), None);

        let mut location = RouteLocation::start();
        location.params.insert("id".into(), ParamValue::from("7"));
        let props = record.resolve_props(DEFAULT_VIEW, &location).unwrap();
        assert_eq!(props.get("id"), Some(&serde_json::Value::from("7")));
        assert!(record.resolve_props("other", &location).is_none());
    }

    #[test]
    fn test_runtime_guards() {
        let raw = RouteRecordRaw::view("/", View::new("Home"));
        let record = RouteRecord::normalize(&raw, RouteId(1), "/".into(), None);

        let handle = record.add_leave_guard(guard_fn(|_, _| Ok(GuardOutcome::Continue)));
        record.add_update_guard(guard_fn(|_, _| Ok(GuardOutcome::Continue)));
        assert_eq!(record.leave_guards().len(), 1);
        handle.remove();
        assert!(record.leave_guards().is_empty());

        record.on_enter(DEFAULT_VIEW, || {});
        record.clear_runtime_guards();
        assert!(record.update_guards().is_empty());
        assert!(record.take_enter_callbacks(DEFAULT_VIEW).is_empty());
    }

    #[test]
    fn test_alias_identity() {
        let raw = RouteRecordRaw::view("/a", View::new("A"));
        let canonical = RouteRecord::normalize(&raw, RouteId(1), "/a".into(), None);
        let alias = RouteRecord::normalize(&raw, RouteId(2), "/b".into(), Some(&canonical));
        assert!(!canonical.is_alias());
        assert!(alias.is_alias());
        assert_eq!(alias.canonical_id(), canonical.id());
    }

    #[test]
    fn test_alias_shares_runtime_guards() {
        let raw = RouteRecordRaw::view("/a", View::new("A"));
        let canonical = RouteRecord::normalize(&raw, RouteId(1), "/a".into(), None);
        let alias = RouteRecord::normalize(&raw, RouteId(2), "/b".into(), Some(&canonical));

        canonical.add_leave_guard(guard_fn(|_, _| Ok(GuardOutcome::Continue)));
        alias.add_update_guard(guard_fn(|_, _| Ok(GuardOutcome::Continue)));
        alias.on_enter(DEFAULT_VIEW, || {});

        assert_eq!(alias.leave_guards().len(), 1);
        assert_eq!(canonical.update_guards().len(), 1);
        assert_eq!(canonical.take_enter_callbacks(DEFAULT_VIEW).len(), 1);
        assert!(alias.take_enter_callbacks(DEFAULT_VIEW).is_empty());
    }
}
