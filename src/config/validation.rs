//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every path compiles, joined with its parents
//! - Check names are unique and each route has exactly one kind of content
//! - Validate value ranges (log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{RouteConfig, RouterConfig};
use crate::routing::path_parser::{PathParser, PathParserOptions};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route \"{path}\": invalid path: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route name \"{name}\" is used more than once")]
    DuplicateName { name: String },

    #[error("route \"{path}\" has no view, views, redirect or children")]
    MissingContent { path: String },

    #[error("route \"{path}\": {reason}")]
    ConflictingContent { path: String, reason: String },

    #[error("invalid log level \"{level}\"")]
    InvalidLogLevel { level: String },
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel {
            level: config.observability.log_level.clone(),
        });
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        validate_route(route, None, config, &mut names, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(
    route: &RouteConfig,
    parent_path: Option<&str>,
    config: &RouterConfig,
    names: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    let path = join(parent_path, &route.path);

    let mut patterns = vec![path.clone()];
    patterns.extend(route.alias.iter().map(|alias| join(parent_path, alias)));
    for pattern in &patterns {
        let options = PathParserOptions {
            sensitive: route.sensitive.unwrap_or(config.matching.sensitive),
            strict: route.strict.unwrap_or(config.matching.strict),
            end: route.end.unwrap_or(config.matching.end),
        };
        if pattern == "*" {
            errors.push(ValidationError::InvalidPath {
                path: pattern.clone(),
                reason: "catch all routes must use a param with a custom regexp, e.g. \"/:path(.*)*\"".to_string(),
            });
        } else if let Err(e) = PathParser::new(pattern, &options) {
            errors.push(ValidationError::InvalidPath {
                path: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if let Some(name) = &route.name {
        if !names.insert(name.clone()) {
            errors.push(ValidationError::DuplicateName { name: name.clone() });
        }
    }

    let has_views = route.view.is_some() || !route.views.is_empty();
    match (&route.redirect, has_views, route.children.is_empty()) {
        (Some(_), true, _) => errors.push(ValidationError::ConflictingContent {
            path: path.clone(),
            reason: "a redirect cannot render views".to_string(),
        }),
        (Some(_), false, false) => errors.push(ValidationError::ConflictingContent {
            path: path.clone(),
            reason: "a redirect cannot have children".to_string(),
        }),
        (None, false, true) => errors.push(ValidationError::MissingContent { path: path.clone() }),
        _ => {}
    }
    if route.redirect.is_some() && route.props {
        errors.push(ValidationError::ConflictingContent {
            path: path.clone(),
            reason: "a redirect cannot declare props".to_string(),
        });
    }

    for child in &route.children {
        validate_route(child, Some(&path), config, names, errors);
    }
}

fn join(parent: Option<&str>, path: &str) -> String {
    match parent {
        Some(parent) if !path.starts_with('/') => {
            if path.is_empty() {
                parent.to_string()
            } else if parent.ends_with('/') {
                format!("{parent}{path}")
            } else {
                format!("{parent}/{path}")
            }
        }
        _ => path.to_string(),
    }
}
