//! Locations: navigation targets and resolved routes.
//!
//! # Data Flow
//! ```text
//! RouteLocationRaw (path string | name + params | current + params)
//!     → Router::resolve
//!     → RouteLocation (path, params, query, hash, matched chain, meta)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::routing::encoding::decode;
use crate::routing::query::{LocationQuery, QueryCodec};
use crate::routing::record::{RouteMeta, RouteRecord};

/// A param value: repeatable params hold a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    /// The value of a single param, `None` for a list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::List(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Single(value) => value.is_empty(),
            ParamValue::List(values) => values.is_empty(),
        }
    }

    /// Apply `f` to every contained string.
    pub fn map(&self, f: impl Fn(&str) -> String) -> ParamValue {
        match self {
            ParamValue::Single(value) => ParamValue::Single(f(value)),
            ParamValue::List(values) => ParamValue::List(values.iter().map(|v| f(v)).collect()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Single(value) => f.write_str(value),
            ParamValue::List(values) => f.write_str(&values.join("/")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Params keyed by name.
pub type RouteParams = BTreeMap<String, ParamValue>;

/// A fully resolved location.
#[derive(Debug, Clone, Default)]
pub struct RouteLocation {
    /// Encoded path, without query and hash.
    pub path: String,
    /// Path, query and hash.
    pub full_path: String,
    /// `full_path` as rendered by the history (base included).
    pub href: String,
    /// Name of the matched route.
    pub name: Option<String>,
    /// Decoded params.
    pub params: RouteParams,
    pub query: LocationQuery,
    /// Decoded hash with its leading `#`, or empty.
    pub hash: String,
    /// Matched records, root first. Empty when nothing matched.
    pub matched: Vec<Arc<RouteRecord>>,
    /// Meta of every matched record merged root first.
    pub meta: RouteMeta,
    /// The location that redirected here.
    pub redirected_from: Option<Arc<RouteLocation>>,
}

impl RouteLocation {
    /// The location a router holds before its first navigation.
    pub fn start() -> Self {
        Self {
            path: "/".to_string(),
            full_path: "/".to_string(),
            href: "/".to_string(),
            ..Default::default()
        }
    }

    /// Deepest matched record.
    pub fn leaf(&self) -> Option<&Arc<RouteRecord>> {
        self.matched.last()
    }

    pub fn is_matched(&self) -> bool {
        !self.matched.is_empty()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_str)
    }
}

/// What a navigation target designates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocationTarget {
    /// A path, absolute or relative to the current path. May carry a query
    /// and a hash.
    Path(String),
    /// A named route.
    Name(String),
    /// The current route, with `params` merged over the current params.
    #[default]
    Current,
}

/// A navigation target before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteLocationRaw {
    pub target: LocationTarget,
    pub params: RouteParams,
    /// Overrides the query parsed from a path target.
    pub query: Option<LocationQuery>,
    /// Overrides the hash parsed from a path target.
    pub hash: Option<String>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// Navigate even if the target is the current location.
    pub force: bool,
    /// Extra data stored in the history entry.
    pub state: Option<serde_json::Value>,
}

impl RouteLocationRaw {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            target: LocationTarget::Path(path.into()),
            ..Default::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            target: LocationTarget::Name(name.into()),
            ..Default::default()
        }
    }

    pub fn current() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: RouteParams) -> Self {
        self.params = params;
        self
    }

    pub fn query(mut self, query: LocationQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        self.hash = Some(if hash.is_empty() || hash.starts_with('#') {
            hash
        } else {
            format!("#{hash}")
        });
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }
}

impl From<&str> for RouteLocationRaw {
    fn from(path: &str) -> Self {
        RouteLocationRaw::path(path)
    }
}

impl From<String> for RouteLocationRaw {
    fn from(path: String) -> Self {
        RouteLocationRaw::path(path)
    }
}

impl From<&RouteLocation> for RouteLocationRaw {
    fn from(location: &RouteLocation) -> Self {
        RouteLocationRaw::path(location.full_path.clone())
    }
}

impl fmt::Display for RouteLocationRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            LocationTarget::Path(path) => write!(f, "{{\"path\":\"{path}\"}}"),
            LocationTarget::Name(name) => write!(f, "{{\"name\":\"{name}\"}}"),
            LocationTarget::Current => write!(f, "{{\"params\":{:?}}}", self.params),
        }
    }
}

/// The pieces of a parsed URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    pub full_path: String,
    pub path: String,
    pub query: LocationQuery,
    /// Decoded hash with its leading `#`.
    pub hash: String,
}

/// Split `location` into path, query and hash. Relative paths resolve
/// against `current_path`.
pub fn parse_url(codec: &dyn QueryCodec, location: &str, current_path: &str) -> ParsedUrl {
    let hash_pos = location.find('#');
    let mut search_pos = location.find('?');
    if let (Some(hash), Some(search)) = (hash_pos, search_pos) {
        if hash < search {
            search_pos = None;
        }
    }

    let mut path: Option<&str> = None;
    let mut search = "";
    let mut query = LocationQuery::new();
    let mut hash = "";

    if let Some(search_pos) = search_pos {
        path = Some(&location[..search_pos]);
        search = &location[search_pos + 1..hash_pos.unwrap_or(location.len())];
        query = codec.parse(search);
    }

    if let Some(hash_pos) = hash_pos {
        if path.map_or(true, str::is_empty) {
            path = Some(&location[..hash_pos]);
        }
        hash = &location[hash_pos..];
    }

    let path = resolve_relative_path(path.unwrap_or(location), current_path);
    let mut full_path = path.clone();
    if !search.is_empty() {
        full_path.push('?');
        full_path.push_str(search);
    }
    full_path.push_str(hash);

    ParsedUrl {
        full_path,
        path,
        query,
        hash: decode(hash),
    }
}

/// Join `path`, the stringified `query` and an already encoded `hash`.
pub fn stringify_url(codec: &dyn QueryCodec, path: &str, query: &LocationQuery, hash: &str) -> String {
    let search = codec.stringify(query);
    let mut url = path.to_string();
    if !search.is_empty() {
        url.push('?');
        url.push_str(&search);
    }
    url.push_str(hash);
    url
}

/// Resolve `to` against `from`, honouring `.` and `..` segments.
pub fn resolve_relative_path(to: &str, from: &str) -> String {
    if to.starts_with('/') {
        return to.to_string();
    }
    if to.is_empty() {
        return from.to_string();
    }

    let from_segments: Vec<&str> = from.split('/').collect();
    let mut to_segments: Vec<&str> = to.split('/').collect();
    if matches!(to_segments.last(), Some(&"..") | Some(&".")) {
        to_segments.push("");
    }

    let mut position = from_segments.len() - 1;
    let mut to_position = 0;
    while to_position < to_segments.len() {
        match to_segments[to_position] {
            "." => {}
            ".." => {
                if position > 1 {
                    position -= 1;
                }
            }
            _ => break,
        }
        to_position += 1;
    }

    format!(
        "{}/{}",
        from_segments[..position].join("/"),
        to_segments[to_position..].join("/")
    )
}

/// Whether two records are the same route, aliases included.
pub fn is_same_route_record(a: &RouteRecord, b: &RouteRecord) -> bool {
    a.canonical_id() == b.canonical_id()
}

/// Value equality used for duplicate detection: same path, same
/// stringified query and same hash.
pub fn is_same_route_location(codec: &dyn QueryCodec, a: &RouteLocation, b: &RouteLocation) -> bool {
    a.path == b.path && a.hash == b.hash && codec.stringify(&a.query) == codec.stringify(&b.query)
}

/// Shallow-merge the meta of `matched`, deeper records winning.
pub fn merge_meta(matched: &[Arc<RouteRecord>]) -> RouteMeta {
    let mut meta = RouteMeta::new();
    for record in matched {
        for (key, value) in record.meta() {
            meta.insert(key.clone(), value.clone());
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::query::{DefaultQueryCodec, QueryValue};

    #[test]
    fn test_parse_url() {
        let parsed = parse_url(&DefaultQueryCodec, "/a/b?x=1&y#top", "/");
        assert_eq!(parsed.path, "/a/b");
        assert_eq!(parsed.full_path, "/a/b?x=1&y#top");
        assert_eq!(parsed.hash, "#top");
        assert_eq!(parsed.query.get("x"), Some(&QueryValue::from("1")));
        assert_eq!(parsed.query.get("y"), Some(&QueryValue::Single(None)));
    }

    #[test]
    fn test_parse_url_hash_before_question_mark() {
        let parsed = parse_url(&DefaultQueryCodec, "/a#b?c", "/");
        assert_eq!(parsed.path, "/a");
        assert_eq!(parsed.hash, "#b?c");
        assert!(parsed.query.is_empty());
    }

    #[test]
    fn test_parse_url_relative() {
        let parsed = parse_url(&DefaultQueryCodec, "c?q=1", "/a/b");
        assert_eq!(parsed.path, "/a/c");
        assert_eq!(parsed.full_path, "/a/c?q=1");
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(resolve_relative_path("/abs", "/a/b"), "/abs");
        assert_eq!(resolve_relative_path("", "/a/b"), "/a/b");
        assert_eq!(resolve_relative_path("c", "/a/b"), "/a/c");
        assert_eq!(resolve_relative_path("./c", "/a/b"), "/a/c");
        assert_eq!(resolve_relative_path("../c", "/a/b/d"), "/a/c");
        assert_eq!(resolve_relative_path("..", "/a/b/d"), "/a/");
        assert_eq!(resolve_relative_path("../../../c", "/a/b"), "/c");
    }

    #[test]
    fn test_stringify_url() {
        let mut query = LocationQuery::new();
        query.insert("q".into(), "a b".into());
        assert_eq!(stringify_url(&DefaultQueryCodec, "/s", &query, "#h"), "/s?q=a+b#h");
        assert_eq!(stringify_url(&DefaultQueryCodec, "/s", &LocationQuery::new(), ""), "/s");
    }

    #[test]
    fn test_raw_builders() {
        let raw = RouteLocationRaw::name("user").param("id", "5").hash("top");
        assert_eq!(raw.target, LocationTarget::Name("user".into()));
        assert_eq!(raw.params.get("id"), Some(&ParamValue::from("5")));
        assert_eq!(raw.hash.as_deref(), Some("#top"));
        assert_eq!(RouteLocationRaw::from("/x").target, LocationTarget::Path("/x".into()));
    }

    #[test]
    fn test_same_location() {
        let mut a = RouteLocation::start();
        let mut b = RouteLocation::start();
        assert!(is_same_route_location(&DefaultQueryCodec, &a, &b));
        a.query.insert("x".into(), "1".into());
        assert!(!is_same_route_location(&DefaultQueryCodec, &a, &b));
        b.query.insert("x".into(), "1".into());
        b.hash = "#h".into();
        assert!(!is_same_route_location(&DefaultQueryCodec, &a, &b));
    }
}
