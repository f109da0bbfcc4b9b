//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::routing::path_parser::PathParserOptions;
use crate::routing::record::{RouteContent, RouteMeta, RouteProps, RouteRecordRaw, RouteRedirect, View, DEFAULT_VIEW};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Default matching options for every route.
    pub matching: MatchingConfig,

    /// History settings.
    pub history: HistoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route definitions.
    pub routes: Vec<RouteConfig>,
}

/// Default path matching options.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Case-sensitive matching.
    pub sensitive: bool,

    /// Reject a trailing slash the pattern does not declare.
    pub strict: bool,

    /// Patterns must match up to the end of the path.
    pub end: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

impl From<MatchingConfig> for PathParserOptions {
    fn from(config: MatchingConfig) -> Self {
        PathParserOptions {
            sensitive: config.sensitive,
            strict: config.strict,
            end: config.end,
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Base prepended to every href (e.g., "/app").
    pub base: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

/// One route definition.
///
/// Exactly one of `view`, `views`, `redirect` or `children` gives the route
/// its content; `view`/`views` may accompany `children` as layout.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouteConfig {
    /// Path pattern; relative for children.
    pub path: String,

    /// Unique route name.
    pub name: Option<String>,

    /// View rendered in the default slot.
    pub view: Option<String>,

    /// Views keyed by slot.
    pub views: BTreeMap<String, String>,

    /// Path to redirect to.
    pub redirect: Option<String>,

    /// Additional paths matching the same route.
    pub alias: Vec<String>,

    /// Nested routes.
    pub children: Vec<RouteConfig>,

    /// Arbitrary metadata.
    pub meta: RouteMeta,

    /// Pass the route params to every view as props.
    pub props: bool,

    pub sensitive: Option<bool>,
    pub strict: Option<bool>,
    pub end: Option<bool>,
}

impl RouteConfig {
    fn components(&self) -> BTreeMap<String, View> {
        let mut views: BTreeMap<String, View> = self
            .views
            .iter()
            .map(|(slot, view)| (slot.clone(), View::new(view.clone())))
            .collect();
        if let Some(view) = &self.view {
            views.insert(DEFAULT_VIEW.to_string(), View::new(view.clone()));
        }
        views
    }

    /// Convert into a route definition. Run validation first; a route
    /// without content becomes an empty `Components` record, which
    /// registration rejects.
    pub fn to_record(&self) -> RouteRecordRaw {
        let content = if let Some(target) = &self.redirect {
            RouteContent::Redirect(RouteRedirect::To(target.as_str().into()))
        } else if !self.children.is_empty() {
            RouteContent::Nested {
                components: self.components(),
                children: self.children.iter().map(RouteConfig::to_record).collect(),
            }
        } else if let (Some(view), true) = (&self.view, self.views.is_empty()) {
            RouteContent::Component(View::new(view.clone()))
        } else {
            RouteContent::Components(self.components())
        };

        let mut raw = RouteRecordRaw::new(self.path.clone(), content);
        raw.name = self.name.clone();
        raw.alias = self.alias.clone();
        raw.meta = self.meta.clone();
        raw.sensitive = self.sensitive;
        raw.strict = self.strict;
        raw.end = self.end;
        if self.props {
            raw = raw.props(RouteProps::Params);
        }
        raw
    }
}
