//! Query string handling.
//!
//! A key without `=` parses to `None`, `key=` to `Some("")`. Repeated keys
//! collect into a list in order of appearance.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::routing::encoding::{decode, encode_query};

/// One query value: a single entry or a list of repeated entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(Option<String>),
    List(Vec<Option<String>>),
}

impl QueryValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => value.as_deref(),
            QueryValue::List(values) => values.first().and_then(|v| v.as_deref()),
        }
    }

    fn push(&mut self, value: Option<String>) {
        match self {
            QueryValue::Single(existing) => {
                let existing = existing.take();
                *self = QueryValue::List(vec![existing, value]);
            }
            QueryValue::List(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(Some(value.to_string()))
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(Some(value))
    }
}

/// Decoded query of a location, in insertion order.
pub type LocationQuery = IndexMap<String, QueryValue>;

/// Parse a search string, with or without its leading `?`.
pub fn parse_query(search: &str) -> LocationQuery {
    let mut query = LocationQuery::new();
    if search.is_empty() || search == "?" {
        return query;
    }

    let search = search.strip_prefix('?').unwrap_or(search);
    for param in search.split('&') {
        let param = param.replace('+', " ");
        let (key, value) = match param.find('=') {
            Some(pos) => (decode(&param[..pos]), Some(decode(&param[pos + 1..]))),
            None => (decode(&param), None),
        };

        match query.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                query.insert(key, QueryValue::Single(value));
            }
        }
    }
    query
}

/// Stringify a query without the leading `?`.
pub fn stringify_query(query: &LocationQuery) -> String {
    let mut search = String::new();
    let mut append = |key: &str, value: Option<&str>| {
        if !search.is_empty() {
            search.push('&');
        }
        search.push_str(key);
        if let Some(value) = value {
            search.push('=');
            search.push_str(&encode_query(value));
        }
    };

    for (key, value) in query {
        let key = encode_query(key);
        match value {
            QueryValue::Single(value) => append(&key, value.as_deref()),
            QueryValue::List(values) => {
                for value in values {
                    append(&key, value.as_deref());
                }
            }
        }
    }
    search
}

/// Pluggable query parsing and serialization.
///
/// Duplicate detection compares stringified queries, so a custom codec also
/// defines when two queries are equal.
pub trait QueryCodec: Send + Sync {
    fn parse(&self, search: &str) -> LocationQuery;
    fn stringify(&self, query: &LocationQuery) -> String;
}

/// The default `key=value&key2` codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQueryCodec;

impl QueryCodec for DefaultQueryCodec {
    fn parse(&self, search: &str) -> LocationQuery {
        parse_query(search)
    }

    fn stringify(&self, query: &LocationQuery) -> String {
        stringify_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let query = parse_query("?a=1&b&c=&a=2&d=x+y%21");
        assert_eq!(
            query.get("a"),
            Some(&QueryValue::List(vec![Some("1".into()), Some("2".into())]))
        );
        assert_eq!(query.get("b"), Some(&QueryValue::Single(None)));
        assert_eq!(query.get("c"), Some(&QueryValue::Single(Some(String::new()))));
        assert_eq!(query.get("d").and_then(|v| v.first()), Some("x y!"));
        assert!(parse_query("").is_empty());
        assert!(parse_query("?").is_empty());
    }

    #[test]
    fn test_stringify_query() {
        let mut query = LocationQuery::new();
        query.insert("q".into(), "a b".into());
        query.insert("flag".into(), QueryValue::Single(None));
        query.insert(
            "tag".into(),
            QueryValue::List(vec![Some("x".into()), Some("y".into())]),
        );
        assert_eq!(stringify_query(&query), "q=a+b&flag&tag=x&tag=y");
    }

    #[test]
    fn test_order_is_preserved() {
        let query = parse_query("z=1&a=2");
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(stringify_query(&query), "z=1&a=2");
    }
}
