//! Registry of compiled route matchers.
//!
//! # Responsibilities
//! - Compile route definitions (children and aliases included) into matchers
//! - Keep matchable records ranked by specificity
//! - Index canonical records by name
//! - Resolve a path, a name or the current location into a matched chain
//!
//! # Design Decisions
//! - Matchers live in an arena keyed by `RouteId`; ids are never reused
//! - A parent is ranked before its children are added, so a child tying
//!   with its parent is always placed ahead of it
//! - Registering a canonical record under a taken name replaces the previous
//!   registration
//! - A route tree is checked in full before anything is registered, so a
//!   failed `add_route` leaves the registry untouched

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::routing::location::{merge_meta, LocationTarget, RouteParams};
use crate::routing::path_parser::{compare_path_parser_score, PathParser, PathParserOptions};
use crate::routing::record::{RouteId, RouteMeta, RouteRecord, RouteRecordRaw, RouteRef};

/// A compiled record with its tree links.
#[derive(Debug)]
pub struct RouteRecordMatcher {
    record: Arc<RouteRecord>,
    parser: PathParser,
    parent: Option<RouteId>,
    children: Vec<RouteId>,
    aliases: Vec<RouteId>,
}

impl RouteRecordMatcher {
    pub fn record(&self) -> &Arc<RouteRecord> {
        &self.record
    }

    pub fn parser(&self) -> &PathParser {
        &self.parser
    }

    pub fn parent(&self) -> Option<RouteId> {
        self.parent
    }

    pub fn children(&self) -> &[RouteId] {
        &self.children
    }

    pub fn aliases(&self) -> &[RouteId] {
        &self.aliases
    }
}

/// Result of a matcher-level resolution.
#[derive(Debug, Clone, Default)]
pub struct MatcherLocation {
    pub name: Option<String>,
    /// Path built from, or matched against, the registered pattern.
    pub path: String,
    pub params: RouteParams,
    /// Matched records, root first.
    pub matched: Vec<Arc<RouteRecord>>,
    pub meta: RouteMeta,
}

/// Route registry.
#[derive(Debug, Default)]
pub struct RouterMatcher {
    options: PathParserOptions,
    next_id: u64,
    arena: HashMap<RouteId, RouteRecordMatcher>,
    /// Matchable records, most specific first.
    ranked: Vec<RouteId>,
    names: HashMap<String, RouteId>,
}

impl RouterMatcher {
    /// An empty registry; `options` are the defaults for every pattern.
    pub fn new(options: PathParserOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Register `raw` and its children under `parent`, returning the id of
    /// the canonical record.
    pub fn add_route(&mut self, raw: &RouteRecordRaw, parent: Option<RouteId>) -> RouterResult<RouteId> {
        let parent_path = match parent {
            Some(parent) => {
                let matcher = self.arena.get(&parent).ok_or_else(|| RouterError::MatcherNotFound {
                    location: parent.to_string(),
                })?;
                Some(matcher.record.path().to_string())
            }
            None => None,
        };

        // replacing any of these names would remove the parent itself
        let mut ancestors = parent.map(|parent| self.names_above(parent)).unwrap_or_default();
        check_names(raw, &mut ancestors, &mut HashSet::new())?;
        self.check_paths(raw, parent_path.as_deref())?;

        self.add_route_inner(raw, parent, None)
    }

    /// Canonical names of `id` and of every record whose removal cascades
    /// to it.
    fn names_above(&self, id: RouteId) -> Vec<String> {
        let mut names = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(matcher) = self.arena.get(&current) else {
                continue;
            };
            if let Some(name) = matcher.record.name() {
                if self.names.get(name) == Some(&current) {
                    names.push(name.to_string());
                }
            }
            stack.extend(matcher.parent);
            stack.extend(matcher.record.alias_of());
        }
        names
    }

    /// Compile every path of the tree, aliases included, without registering.
    fn check_paths(&self, raw: &RouteRecordRaw, parent_path: Option<&str>) -> RouterResult<()> {
        raw.validate()?;
        let options = raw.path_options(&self.options);
        for own_path in std::iter::once(&raw.path).chain(&raw.alias) {
            let path = join_paths(parent_path, own_path);
            PathParser::new(&path, &options)?;
            for child in raw.children() {
                self.check_paths(child, Some(&path))?;
            }
        }
        Ok(())
    }

    fn add_route_inner(
        &mut self,
        raw: &RouteRecordRaw,
        parent: Option<RouteId>,
        original: Option<RouteId>,
    ) -> RouterResult<RouteId> {
        check_unnamed_empty_child(raw);

        let options = raw.path_options(&self.options);
        let mut paths = vec![raw.path.clone()];
        paths.extend(raw.alias.iter().cloned());

        // canonical ids of the children of the canonical record, used as the
        // originals of the alias children
        let mut canonical_children: Vec<RouteId> = original
            .map(|id| self.canonical_children(id))
            .unwrap_or_default();
        let mut main: Option<RouteId> = None;

        for (index, own_path) in paths.iter().enumerate() {
            let alias_of = if index == 0 { original } else { original.or(main) };
            let parent_matcher = parent.and_then(|parent_id| self.arena.get(&parent_id));
            let path = join_paths(parent_matcher.map(|m| m.record.path()), own_path);
            let parser = PathParser::new(&path, &options)?;

            if let Some(parent_matcher) = parent_matcher.filter(|_| own_path.starts_with('/')) {
                let missing = missing_parent_params(&parent_matcher.parser, &parser);
                if !missing.is_empty() {
                    warn!(
                        path = %path,
                        parent = %parent_matcher.record.path(),
                        missing = ?missing,
                        "Absolute child path is missing params of its parent"
                    );
                }
            }
            if let Some(name) = duplicated_param(&parser) {
                warn!(path = %path, param = %name, "Route path declares the same param twice");
            }

            if alias_of.is_none() {
                if let Some(name) = &raw.name {
                    if self.names.contains_key(name) {
                        debug!(name = %name, "Replacing route registered under the same name");
                        self.remove_route(name);
                    }
                }
            }

            let id = self.allocate_id();
            let original_record = alias_of.and_then(|original_id| self.arena.get(&original_id));
            let record = Arc::new(RouteRecord::normalize(
                raw,
                id,
                path,
                original_record.map(|m| m.record.as_ref()),
            ));
            let matcher = RouteRecordMatcher {
                record: record.clone(),
                parser,
                parent,
                children: Vec::new(),
                aliases: Vec::new(),
            };
            self.arena.insert(id, matcher);

            if let Some(parent_id) = parent {
                if let Some(parent) = self.arena.get_mut(&parent_id) {
                    parent.children.push(id);
                }
            }
            match alias_of {
                Some(original_id) => {
                    if let Some(original) = self.arena.get_mut(&original_id) {
                        original.aliases.push(id);
                    }
                }
                None => main = Some(id),
            }

            if record.is_matchable() {
                self.insert_matcher(id);
            }

            let mut child_ids = Vec::with_capacity(raw.children().len());
            for (child_index, child) in raw.children().iter().enumerate() {
                let child_original = if alias_of.is_some() {
                    canonical_children.get(child_index).copied()
                } else {
                    None
                };
                child_ids.push(self.add_route_inner(child, Some(id), child_original)?);
            }
            if index == 0 && original.is_none() {
                canonical_children = child_ids;
            }
        }

        let id = main.or(original).ok_or_else(|| RouterError::InvalidRecord {
            path: raw.path.clone(),
            reason: "record produced no matcher".to_string(),
        })?;
        Ok(id)
    }

    fn allocate_id(&mut self) -> RouteId {
        self.next_id += 1;
        RouteId(self.next_id)
    }

    /// Canonical children of `id`, in registration order.
    fn canonical_children(&self, id: RouteId) -> Vec<RouteId> {
        self.arena
            .get(&id)
            .map(|matcher| {
                matcher
                    .children
                    .iter()
                    .copied()
                    .filter(|child| self.arena.get(child).is_some_and(|c| !c.record.is_alias()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_matcher(&mut self, id: RouteId) {
        let index = self.find_insertion_index(id);
        self.ranked.insert(index, id);

        let record = &self.arena[&id].record;
        if let (Some(name), false) = (record.name(), record.is_alias()) {
            self.names.insert(name.to_string(), id);
        }
        metrics::record_registered_routes(self.ranked.len());
    }

    /// Binary search for the slot after every matcher ranking at least as
    /// high, then move before a tying ancestor.
    fn find_insertion_index(&self, id: RouteId) -> usize {
        let score = self.arena[&id].parser.score();
        let mut lower = 0;
        let mut upper = self.ranked.len();
        while lower < upper {
            let mid = (lower + upper) / 2;
            let other = self.arena[&self.ranked[mid]].parser.score();
            if compare_path_parser_score(score, other).is_lt() {
                upper = mid;
            } else {
                lower = mid + 1;
            }
        }

        if let Some(ancestor) = self.insertion_ancestor(id) {
            if let Some(position) = self.ranked[..upper].iter().rposition(|ranked| *ranked == ancestor) {
                upper = position;
            }
        }
        upper
    }

    /// Closest matchable ancestor with the same score.
    fn insertion_ancestor(&self, id: RouteId) -> Option<RouteId> {
        let matcher = &self.arena[&id];
        let mut current = matcher.parent;
        while let Some(ancestor_id) = current {
            let ancestor = self.arena.get(&ancestor_id)?;
            if ancestor.record.is_matchable()
                && compare_path_parser_score(matcher.parser.score(), ancestor.parser.score()).is_eq()
            {
                return Some(ancestor_id);
            }
            current = ancestor.parent;
        }
        None
    }

    /// Remove the canonical record registered under `name`. Returns whether
    /// something was removed.
    pub fn remove_route(&mut self, name: &str) -> bool {
        match self.names.get(name).copied() {
            Some(id) => {
                self.remove_matcher(id);
                true
            }
            None => false,
        }
    }

    /// Remove a matcher with its children and aliases. Unknown ids are a
    /// no-op.
    pub fn remove_matcher(&mut self, id: RouteId) {
        let Some(matcher) = self.arena.remove(&id) else {
            return;
        };

        if let Some(name) = matcher.record.name() {
            if self.names.get(name) == Some(&id) {
                self.names.remove(name);
            }
        }
        self.ranked.retain(|ranked| *ranked != id);
        if let Some(parent) = matcher.parent.and_then(|parent| self.arena.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }
        if let Some(original) = matcher.record.alias_of().and_then(|original| self.arena.get_mut(&original)) {
            original.aliases.retain(|alias| *alias != id);
        }
        // an alias shares its runtime guards with the canonical record
        if !matcher.record.is_alias() {
            matcher.record.clear_runtime_guards();
        }

        for child in matcher.children {
            self.remove_matcher(child);
        }
        for alias in matcher.aliases {
            self.remove_matcher(alias);
        }
        metrics::record_registered_routes(self.ranked.len());
    }

    /// Ranked matchable records.
    pub fn get_routes(&self) -> Vec<&RouteRecordMatcher> {
        self.ranked.iter().filter_map(|id| self.arena.get(id)).collect()
    }

    pub fn get_record_matcher(&self, name: &str) -> Option<&RouteRecordMatcher> {
        self.names.get(name).and_then(|id| self.arena.get(id))
    }

    pub fn get_matcher(&self, id: RouteId) -> Option<&RouteRecordMatcher> {
        self.arena.get(&id)
    }

    /// Id of a registered route. Names resolve to canonical records only.
    pub fn find(&self, route: RouteRef<'_>) -> Option<RouteId> {
        match route {
            RouteRef::Name(name) => self.names.get(name).copied(),
            RouteRef::Id(id) => self.arena.contains_key(&id).then_some(id),
        }
    }

    /// Defaults applied to every pattern.
    pub fn options(&self) -> PathParserOptions {
        self.options
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn clear_routes(&mut self) {
        for matcher in self.arena.values() {
            matcher.record.clear_runtime_guards();
        }
        self.arena.clear();
        self.ranked.clear();
        self.names.clear();
        metrics::record_registered_routes(0);
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Resolve `target` against `current`.
    ///
    /// - `Name`: params of `current` required by the route (and optional
    ///   params of its parent) are inherited, then overridden by `params`
    ///   restricted to declared keys
    /// - `Path`: first ranked match; no match yields an empty chain
    /// - `Current`: the current route, with `params` merged over the current
    ///   params
    pub fn resolve(
        &self,
        target: &LocationTarget,
        params: &RouteParams,
        current: &MatcherLocation,
    ) -> RouterResult<MatcherLocation> {
        let (matcher, path, params) = match target {
            LocationTarget::Name(name) => {
                let matcher = self.get_record_matcher(name).ok_or_else(|| RouterError::MatcherNotFound {
                    location: format!("{{\"name\":\"{name}\"}}"),
                })?;

                let mut inherited: Vec<&str> = matcher
                    .parser
                    .keys()
                    .iter()
                    .filter(|key| !key.optional)
                    .map(|key| key.name.as_str())
                    .collect();
                if let Some(parent) = matcher.parent.and_then(|id| self.arena.get(&id)) {
                    inherited.extend(
                        parent
                            .parser
                            .keys()
                            .iter()
                            .filter(|key| key.optional)
                            .map(|key| key.name.as_str()),
                    );
                }

                let mut resolved = params_from(&current.params, inherited);
                resolved.extend(params_from(
                    params,
                    matcher.parser.keys().iter().map(|key| key.name.as_str()),
                ));
                let path = matcher.parser.stringify(&resolved)?;
                (Some(matcher), path, resolved)
            }
            LocationTarget::Path(path) => {
                let found = self
                    .get_routes()
                    .into_iter()
                    .find_map(|matcher| matcher.parser.parse(path).map(|params| (matcher, params)));
                match found {
                    Some((matcher, params)) => (Some(matcher), path.clone(), params),
                    None => (None, path.clone(), RouteParams::new()),
                }
            }
            LocationTarget::Current => {
                let matcher = match &current.name {
                    Some(name) => self.get_record_matcher(name),
                    None => self
                        .get_routes()
                        .into_iter()
                        .find(|matcher| matcher.parser.is_match(&current.path)),
                };
                let matcher = matcher.ok_or_else(|| RouterError::MatcherNotFound {
                    location: format!("{{\"path\":\"{}\"}}", current.path),
                })?;

                let mut merged = current.params.clone();
                merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
                let path = matcher.parser.stringify(&merged)?;
                (Some(matcher), path, merged)
            }
        };

        let matched = matcher.map(|m| self.matched_chain(m)).unwrap_or_default();
        Ok(MatcherLocation {
            name: matcher.and_then(|m| m.record.name().map(str::to_string)),
            path,
            params,
            meta: merge_meta(&matched),
            matched,
        })
    }

    /// Records from the root down to `matcher`.
    fn matched_chain(&self, matcher: &RouteRecordMatcher) -> Vec<Arc<RouteRecord>> {
        let mut matched = vec![matcher.record.clone()];
        let mut parent = matcher.parent;
        while let Some(parent_matcher) = parent.and_then(|id| self.arena.get(&id)) {
            matched.push(parent_matcher.record.clone());
            parent = parent_matcher.parent;
        }
        matched.reverse();
        matched
    }
}

/// Path of a child under `parent_path`; absolute paths stand alone.
fn join_paths(parent_path: Option<&str>, path: &str) -> String {
    let Some(parent_path) = parent_path else {
        return path.to_string();
    };
    if path.starts_with('/') {
        return path.to_string();
    }
    if path.is_empty() {
        return parent_path.to_string();
    }
    if parent_path.ends_with('/') {
        format!("{parent_path}{path}")
    } else {
        format!("{parent_path}/{path}")
    }
}

/// Reject a tree that uses a name twice, or reuses one in `ancestors`.
fn check_names(raw: &RouteRecordRaw, ancestors: &mut Vec<String>, seen: &mut HashSet<String>) -> RouterResult<()> {
    if let Some(name) = &raw.name {
        let reason = if ancestors.contains(name) {
            Some("is already used by an ancestor route")
        } else if !seen.insert(name.clone()) {
            Some("is used twice in the same route tree")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RouterError::InvalidRecord {
                path: raw.path.clone(),
                reason: format!("name \"{name}\" {reason}"),
            });
        }
        ancestors.push(name.clone());
    }
    for child in raw.children() {
        check_names(child, ancestors, seen)?;
    }
    if raw.name.is_some() {
        ancestors.pop();
    }
    Ok(())
}

fn params_from<'a>(params: &RouteParams, keys: impl IntoIterator<Item = &'a str>) -> RouteParams {
    keys.into_iter()
        .filter_map(|key| params.get(key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

/// Params of `parent` that `child` does not declare.
pub fn missing_parent_params(parent: &PathParser, child: &PathParser) -> Vec<String> {
    parent
        .keys()
        .iter()
        .filter(|key| !child.keys().iter().any(|child_key| child_key.name == key.name))
        .map(|key| key.name.clone())
        .collect()
}

fn duplicated_param(parser: &PathParser) -> Option<&str> {
    let keys = parser.keys();
    keys.iter().enumerate().find_map(|(index, key)| {
        keys[..index]
            .iter()
            .any(|previous| previous.name == key.name)
            .then_some(key.name.as_str())
    })
}

fn check_unnamed_empty_child(raw: &RouteRecordRaw) {
    let Some(name) = &raw.name else {
        return;
    };
    if raw.children().iter().any(|child| child.name.is_none() && child.path.is_empty()) {
        warn!(
            name = %name,
            "Named route has an unnamed child with an empty path; navigating by the parent's name will not render the child"
        );
    }
}
