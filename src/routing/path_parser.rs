//! Compiled route path patterns.
//!
//! # Responsibilities
//! - Compile tokens into a regex with one capture group per param
//! - Extract params from a concrete path
//! - Build a concrete path back from params
//! - Score each segment so ambiguous paths resolve to the most specific route
//!
//! # Design Decisions
//! - Weights are the reference decimal weights scaled by 20 so they stay
//!   integers and compare exactly
//! - Capture groups are named `p0..pN`, so custom patterns may contain their
//!   own groups without shifting param positions

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use crate::error::{RouterError, RouterResult};
use crate::routing::location::{ParamValue, RouteParams};
use crate::routing::tokenizer::{tokenize_path, ParamToken, Token};

/// Default pattern of a param: anything but a slash.
pub const BASE_PARAM_PATTERN: &str = "[^/]+?";

/// Segment weights.
pub mod score {
    pub const ROOT: i32 = 1800;
    pub const SEGMENT: i32 = 800;
    pub const SUB_SEGMENT: i32 = 600;
    pub const STATIC: i32 = 800;
    pub const DYNAMIC: i32 = 400;
    pub const BONUS_CUSTOM_REGEXP: i32 = 200;
    pub const BONUS_WILDCARD: i32 = -1000;
    pub const BONUS_REPEATABLE: i32 = -400;
    pub const BONUS_OPTIONAL: i32 = -160;
    pub const BONUS_STRICT: i32 = 14;
    pub const BONUS_CASE_SENSITIVE: i32 = 5;
}

/// Matching options for one pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParserOptions {
    /// Match case-sensitively.
    pub sensitive: bool,
    /// Disallow an optional trailing slash.
    pub strict: bool,
    /// Require the pattern to match up to the end of the path.
    pub end: bool,
}

impl Default for PathParserOptions {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// A param declared by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParserParamKey {
    pub name: String,
    pub repeatable: bool,
    pub optional: bool,
    /// Whether the param carries its own pattern.
    pub custom: bool,
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathParser {
    re: Regex,
    keys: Vec<PathParserParamKey>,
    validators: Vec<Regex>,
    segments: Vec<Vec<Token>>,
    score: Vec<Vec<i32>>,
}

fn compile(pattern: &str, path: &str, sensitive: bool) -> RouterResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!sensitive)
        .build()
        .map_err(|e| RouterError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

impl PathParser {
    /// Tokenize and compile `path`.
    pub fn new(path: &str, options: &PathParserOptions) -> RouterResult<Self> {
        let segments = tokenize_path(path)?;
        Self::from_tokens(path, segments, options)
    }

    /// Compile already tokenized segments. `path` is only used in errors.
    pub fn from_tokens(path: &str, segments: Vec<Vec<Token>>, options: &PathParserOptions) -> RouterResult<Self> {
        let mut score = Vec::with_capacity(segments.len());
        let mut pattern = String::from("^");
        let mut keys = Vec::new();
        let mut validators = Vec::new();

        for segment in &segments {
            let mut segment_scores = if segment.is_empty() { vec![score::ROOT] } else { Vec::new() };

            if options.strict && segment.is_empty() {
                pattern.push('/');
            }

            for (token_index, token) in segment.iter().enumerate() {
                let mut sub_segment_score = score::SEGMENT
                    + if options.sensitive { score::BONUS_CASE_SENSITIVE } else { 0 };

                match token {
                    Token::Static(value) => {
                        if token_index == 0 {
                            pattern.push('/');
                        }
                        pattern.push_str(&regex::escape(value));
                        sub_segment_score += score::STATIC;
                    }
                    Token::Param(ParamToken { name, regexp, repeatable, optional }) => {
                        let re = if regexp.is_empty() { BASE_PARAM_PATTERN } else { regexp.as_str() };
                        let custom = re != BASE_PARAM_PATTERN;
                        if custom {
                            sub_segment_score += score::BONUS_CUSTOM_REGEXP;
                            validators.push(compile(&format!("^(?:{re})$"), path, options.sensitive).map_err(
                                |e| RouterError::InvalidPath {
                                    path: path.to_string(),
                                    reason: format!("Invalid custom RegExp for param \"{name}\" ({re}): {e}"),
                                },
                            )?);
                        } else {
                            validators.push(compile(&format!("^(?:{re})$"), path, options.sensitive)?);
                        }

                        let group = format!("p{}", keys.len());
                        keys.push(PathParserParamKey {
                            name: name.clone(),
                            repeatable: *repeatable,
                            optional: *optional,
                            custom,
                        });

                        let mut sub_pattern = if *repeatable {
                            format!("(?P<{group}>(?:{re})(?:/(?:{re}))*)")
                        } else {
                            format!("(?P<{group}>{re})")
                        };
                        if token_index == 0 {
                            sub_pattern = if *optional && segment.len() < 2 {
                                format!("(?:/{sub_pattern})")
                            } else {
                                format!("/{sub_pattern}")
                            };
                        }
                        if *optional {
                            sub_pattern.push('?');
                        }
                        pattern.push_str(&sub_pattern);

                        sub_segment_score += score::DYNAMIC;
                        if *optional {
                            sub_segment_score += score::BONUS_OPTIONAL;
                        }
                        if *repeatable {
                            sub_segment_score += score::BONUS_REPEATABLE;
                        }
                        if re == ".*" {
                            sub_segment_score += score::BONUS_WILDCARD;
                        }
                    }
                }
                segment_scores.push(sub_segment_score);
            }
            score.push(segment_scores);
        }

        if options.strict && options.end {
            if let Some(last) = score.last_mut().and_then(|s| s.last_mut()) {
                *last += score::BONUS_STRICT;
            }
        }

        if !options.strict {
            pattern.push_str("/?");
        }
        if options.end {
            pattern.push('$');
        } else if options.strict && !pattern.ends_with('/') {
            pattern.push_str("(?:/|$)");
        }

        let re = compile(&pattern, path, options.sensitive)?;
        Ok(Self {
            re,
            keys,
            validators,
            segments,
            score,
        })
    }

    /// Whether `path` matches this pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.re.is_match(path)
    }

    /// Extract params from `path`, or `None` when it does not match.
    pub fn parse(&self, path: &str) -> Option<RouteParams> {
        let captures = self.re.captures(path)?;
        let mut params = RouteParams::new();

        for (index, key) in self.keys.iter().enumerate() {
            let value = captures
                .name(&format!("p{index}"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = if !value.is_empty() && key.repeatable {
                ParamValue::List(value.split('/').map(str::to_string).collect())
            } else {
                ParamValue::Single(value.to_string())
            };
            params.insert(key.name.clone(), value);
        }
        Some(params)
    }

    /// Build a concrete path from `params`.
    pub fn stringify(&self, params: &RouteParams) -> RouterResult<String> {
        let mut path = String::new();
        let mut avoid_duplicated_slash = false;
        let mut key_index = 0;

        for segment in &self.segments {
            if !avoid_duplicated_slash || !path.ends_with('/') {
                path.push('/');
            }
            avoid_duplicated_slash = false;

            for token in segment {
                match token {
                    Token::Static(value) => path.push_str(value),
                    Token::Param(ParamToken { name, repeatable, optional, .. }) => {
                        let validator = &self.validators[key_index];
                        key_index += 1;

                        let text = match params.get(name) {
                            None => String::new(),
                            Some(ParamValue::Single(value)) => {
                                self.check_value(name, validator, value)?;
                                value.clone()
                            }
                            Some(ParamValue::List(values)) => {
                                if !repeatable {
                                    return Err(RouterError::InvalidParam {
                                        name: name.clone(),
                                        reason: "Provided param is a list but it is not repeatable (* or + modifiers)"
                                            .to_string(),
                                    });
                                }
                                for value in values {
                                    self.check_value(name, validator, value)?;
                                }
                                values.join("/")
                            }
                        };

                        if text.is_empty() {
                            if *optional {
                                if segment.len() < 2 {
                                    if path.ends_with('/') {
                                        path.pop();
                                    } else {
                                        avoid_duplicated_slash = true;
                                    }
                                }
                            } else {
                                return Err(RouterError::MissingParam { name: name.clone() });
                            }
                        }
                        path.push_str(&text);
                    }
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    fn check_value(&self, name: &str, validator: &Regex, value: &str) -> RouterResult<()> {
        if value.is_empty() || validator.is_match(value) {
            return Ok(());
        }
        Err(RouterError::InvalidParam {
            name: name.to_string(),
            reason: format!("\"{value}\" does not match \"{}\"", validator.as_str()),
        })
    }

    pub fn keys(&self) -> &[PathParserParamKey] {
        &self.keys
    }

    pub fn score(&self) -> &[Vec<i32>] {
        &self.score
    }

    /// Ranking order against `other`: `Less` means `self` is tried first.
    pub fn compare(&self, other: &PathParser) -> Ordering {
        compare_path_parser_score(&self.score, &other.score)
    }
}

fn compare_score_array(a: &[i32], b: &[i32]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match y.cmp(x) {
            Ordering::Equal => continue,
            order => return order,
        }
    }

    // a trailing static segment sorts the shorter one first, otherwise the
    // longer one comes first
    let lone_static = score::STATIC + score::SEGMENT;
    match a.len().cmp(&b.len()) {
        Ordering::Less => {
            if a.len() == 1 && a[0] == lone_static {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        Ordering::Greater => {
            if b.len() == 1 && b[0] == lone_static {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        Ordering::Equal => Ordering::Equal,
    }
}

fn is_last_score_negative(score: &[Vec<i32>]) -> bool {
    score
        .last()
        .and_then(|segment| segment.last())
        .is_some_and(|last| *last < 0)
}

/// Compare two scores, most significant segment first.
pub fn compare_path_parser_score(a: &[Vec<i32>], b: &[Vec<i32>]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_score_array(x, y) {
            Ordering::Equal => continue,
            order => return order,
        }
    }

    if a.len().abs_diff(b.len()) == 1 {
        if is_last_score_negative(a) {
            return Ordering::Greater;
        }
        if is_last_score_negative(b) {
            return Ordering::Less;
        }
    }

    b.len().cmp(&a.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(path: &str) -> PathParser {
        PathParser::new(path, &PathParserOptions::default()).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> RouteParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_static_match() {
        let p = parser("/users");
        assert!(p.is_match("/users"));
        assert!(p.is_match("/users/"));
        assert!(p.is_match("/USERS"));
        assert!(!p.is_match("/users/1"));
    }

    #[test]
    fn test_param_round_trip() {
        let p = parser("/users/:id");
        assert_eq!(p.parse("/users/5"), Some(params(&[("id", "5")])));
        assert_eq!(p.stringify(&params(&[("id", "5")])).unwrap(), "/users/5");
    }

    #[test]
    fn test_missing_param() {
        let p = parser("/users/:id");
        assert!(matches!(
            p.stringify(&RouteParams::new()),
            Err(RouterError::MissingParam { name }) if name == "id"
        ));
    }

    #[test]
    fn test_invalid_param() {
        let p = parser(r"/users/:id(\d+)");
        assert!(p.is_match("/users/42"));
        assert!(!p.is_match("/users/abc"));
        assert!(matches!(
            p.stringify(&params(&[("id", "abc")])),
            Err(RouterError::InvalidParam { .. })
        ));

        let p = parser("/users/:id");
        let list = RouteParams::from([("id".to_string(), ParamValue::List(vec!["a".into(), "b".into()]))]);
        assert!(matches!(p.stringify(&list), Err(RouterError::InvalidParam { .. })));
    }

    #[test]
    fn test_optional_param() {
        let p = parser("/users/:id?");
        assert!(p.is_match("/users"));
        assert_eq!(p.parse("/users"), Some(params(&[("id", "")])));
        assert_eq!(p.stringify(&RouteParams::new()).unwrap(), "/users");

        let p = parser("/:lang?/about");
        assert_eq!(p.stringify(&RouteParams::new()).unwrap(), "/about");
        assert_eq!(p.stringify(&params(&[("lang", "fr")])).unwrap(), "/fr/about");
    }

    #[test]
    fn test_repeatable_param() {
        let p = parser("/files/:path+");
        assert_eq!(
            p.parse("/files/a/b/c").unwrap().get("path"),
            Some(&ParamValue::List(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert!(!p.is_match("/files"));

        let p = parser("/files/:path*");
        assert!(p.is_match("/files"));
        let list = RouteParams::from([(
            "path".to_string(),
            ParamValue::List(vec!["a".into(), "b".into()]),
        )]);
        assert_eq!(p.stringify(&list).unwrap(), "/files/a/b");
    }

    #[test]
    fn test_strict_and_sensitive() {
        let options = PathParserOptions {
            sensitive: true,
            strict: true,
            end: true,
        };
        let p = PathParser::new("/Users", &options).unwrap();
        assert!(p.is_match("/Users"));
        assert!(!p.is_match("/Users/"));
        assert!(!p.is_match("/users"));
    }

    #[test]
    fn test_non_end() {
        let options = PathParserOptions {
            end: false,
            ..Default::default()
        };
        let p = PathParser::new("/docs", &options).unwrap();
        assert!(p.is_match("/docs/intro"));
    }

    #[test]
    fn test_invalid_custom_regexp() {
        let err = PathParser::new("/:id(*)", &PathParserOptions::default()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPath { .. }));
    }

    #[test]
    fn test_scores() {
        assert_eq!(parser("/").score(), &[vec![score::SEGMENT + score::STATIC]]);
        assert_eq!(parser("/:id").score(), &[vec![score::SEGMENT + score::DYNAMIC]]);
        assert_eq!(
            parser("/:path(.*)*").score(),
            &[vec![
                score::SEGMENT
                    + score::DYNAMIC
                    + score::BONUS_CUSTOM_REGEXP
                    + score::BONUS_OPTIONAL
                    + score::BONUS_REPEATABLE
                    + score::BONUS_WILDCARD
            ]]
        );
    }

    fn ordered(paths: &[&str]) -> Vec<String> {
        let mut parsers: Vec<(String, PathParser)> =
            paths.iter().map(|p| (p.to_string(), parser(p))).collect();
        parsers.sort_by(|a, b| a.1.compare(&b.1));
        parsers.into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_ranking() {
        assert_eq!(ordered(&["/:a", "/fixed"]), vec!["/fixed", "/:a"]);
        assert_eq!(ordered(&["/:id?", "/:id"]), vec!["/:id", "/:id?"]);
        assert_eq!(ordered(&["/:id+", "/:id"]), vec!["/:id", "/:id+"]);
        assert_eq!(ordered(&["/:id", r"/:id(\d+)"]), vec![r"/:id(\d+)", "/:id"]);
        assert_eq!(
            ordered(&["/:path(.*)*", "/users/:id", "/users", "/:a"]),
            vec!["/users/:id", "/users", "/:a", "/:path(.*)*"]
        );
    }
}
