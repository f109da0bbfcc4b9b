//! Route path tokenizer.
//!
//! Splits a path pattern such as `/users/:id(\d+)/:tags*` into segments of
//! static and param tokens.
//!
//! # Grammar
//! - Static text, `/` separates segments
//! - `:name` param, name made of `[A-Za-z0-9_]`
//! - `(regex)` right after a param name replaces the default pattern
//! - `?` optional, `*` zero-or-more, `+` one-or-more
//! - `\` escapes the next character outside of a custom regex

use crate::error::{RouterError, RouterResult};

/// One token of a path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Static(String),
    Param(ParamToken),
}

/// A named param inside a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamToken {
    pub name: String,
    /// Custom pattern, empty for the default `[^/]+?`.
    pub regexp: String,
    pub repeatable: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Static,
    Param,
    ParamRegExp,
    ParamRegExpEnd,
    EscapeNext,
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_modifier(c: char) -> bool {
    matches!(c, '*' | '?' | '+')
}

struct Tokenizer<'a> {
    path: &'a str,
    state: State,
    segments: Vec<Vec<Token>>,
    segment: Option<Vec<Token>>,
    buffer: String,
    custom_re: String,
}

impl<'a> Tokenizer<'a> {
    fn crash(&self, reason: impl Into<String>) -> RouterError {
        RouterError::InvalidPath {
            path: self.path.to_string(),
            reason: reason.into(),
        }
    }

    fn finalize_segment(&mut self) {
        if let Some(segment) = self.segment.take() {
            self.segments.push(segment);
        }
        self.segment = Some(Vec::new());
    }

    /// Flush the buffer as a token. `current` is the character that ended it
    /// and doubles as the param modifier.
    fn consume_buffer(&mut self, current: Option<char>) -> RouterResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::take(&mut self.buffer);
        let segment = self.segment.get_or_insert_with(Vec::new);

        match self.state {
            State::Static => segment.push(Token::Static(buffer)),
            State::Param | State::ParamRegExp | State::ParamRegExpEnd => {
                let repeatable = matches!(current, Some('*') | Some('+'));
                if segment.len() > 1 && repeatable {
                    return Err(self.crash(format!(
                        "A repeatable param ({buffer}) must be alone in its segment. eg: '/:ids+."
                    )));
                }
                let segment = self.segment.get_or_insert_with(Vec::new);
                segment.push(Token::Param(ParamToken {
                    name: buffer,
                    regexp: self.custom_re.clone(),
                    repeatable,
                    optional: matches!(current, Some('*') | Some('?')),
                }));
            }
            State::EscapeNext => return Err(self.crash("Invalid state to consume buffer")),
        }
        Ok(())
    }

    fn run(mut self) -> RouterResult<Vec<Vec<Token>>> {
        let chars: Vec<char> = self.path.chars().collect();
        let mut previous_state = State::Static;
        let mut current: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            current = Some(c);
            i += 1;

            if c == '\\' && self.state != State::ParamRegExp {
                previous_state = self.state;
                self.state = State::EscapeNext;
                continue;
            }

            match self.state {
                State::Static => {
                    if c == '/' {
                        self.consume_buffer(current)?;
                        self.finalize_segment();
                    } else if c == ':' {
                        self.consume_buffer(current)?;
                        self.state = State::Param;
                    } else {
                        self.buffer.push(c);
                    }
                }
                State::EscapeNext => {
                    self.buffer.push(c);
                    self.state = previous_state;
                }
                State::Param => {
                    if c == '(' {
                        self.state = State::ParamRegExp;
                    } else if is_param_char(c) {
                        self.buffer.push(c);
                    } else {
                        self.consume_buffer(current)?;
                        self.state = State::Static;
                        if !is_modifier(c) {
                            i -= 1;
                        }
                    }
                }
                State::ParamRegExp => {
                    if c == ')' {
                        if self.custom_re.ends_with('\\') {
                            self.custom_re.pop();
                            self.custom_re.push(c);
                        } else {
                            self.state = State::ParamRegExpEnd;
                        }
                    } else {
                        self.custom_re.push(c);
                    }
                }
                State::ParamRegExpEnd => {
                    self.consume_buffer(current)?;
                    self.state = State::Static;
                    if !is_modifier(c) {
                        i -= 1;
                    }
                    self.custom_re.clear();
                }
            }
        }

        if self.state == State::ParamRegExp {
            return Err(self.crash(format!("Unfinished custom RegExp for param \"{}\"", self.buffer)));
        }

        self.consume_buffer(current)?;
        self.finalize_segment();
        Ok(self.segments)
    }
}

/// Tokenize a route path pattern.
///
/// An empty path yields a single empty segment, `/` yields a root segment
/// holding one empty static token. Any other path must start with `/`.
pub fn tokenize_path(path: &str) -> RouterResult<Vec<Vec<Token>>> {
    if path.is_empty() {
        return Ok(vec![vec![]]);
    }
    if path == "/" {
        return Ok(vec![vec![Token::Static(String::new())]]);
    }
    if !path.starts_with('/') {
        return Err(RouterError::InvalidPath {
            path: path.to_string(),
            reason: format!("Route paths should start with a \"/\": \"{path}\" should be \"/{path}\"."),
        });
    }

    Tokenizer {
        path,
        state: State::Static,
        segments: Vec::new(),
        segment: None,
        buffer: String::new(),
        custom_re: String::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, regexp: &str, repeatable: bool, optional: bool) -> Token {
        Token::Param(ParamToken {
            name: name.into(),
            regexp: regexp.into(),
            repeatable,
            optional,
        })
    }

    #[test]
    fn test_root_and_empty() {
        assert_eq!(tokenize_path("").unwrap(), vec![Vec::<Token>::new()]);
        assert_eq!(tokenize_path("/").unwrap(), vec![vec![Token::Static(String::new())]]);
    }

    #[test]
    fn test_static_segments() {
        assert_eq!(
            tokenize_path("/users/list").unwrap(),
            vec![
                vec![Token::Static("users".into())],
                vec![Token::Static("list".into())]
            ]
        );
        // trailing slash leaves an empty segment
        assert_eq!(
            tokenize_path("/users/").unwrap(),
            vec![vec![Token::Static("users".into())], vec![]]
        );
    }

    #[test]
    fn test_params_and_modifiers() {
        assert_eq!(
            tokenize_path("/:id").unwrap(),
            vec![vec![param("id", "", false, false)]]
        );
        assert_eq!(
            tokenize_path("/:id?").unwrap(),
            vec![vec![param("id", "", false, true)]]
        );
        assert_eq!(
            tokenize_path("/:ids*").unwrap(),
            vec![vec![param("ids", "", true, true)]]
        );
        assert_eq!(
            tokenize_path("/:ids+").unwrap(),
            vec![vec![param("ids", "", true, false)]]
        );
    }

    #[test]
    fn test_custom_regexp() {
        assert_eq!(
            tokenize_path(r"/:id(\d+)").unwrap(),
            vec![vec![param("id", r"\d+", false, false)]]
        );
        assert_eq!(
            tokenize_path("/:path(.*)*").unwrap(),
            vec![vec![param("path", ".*", true, true)]]
        );
        // escaped closing paren stays in the pattern
        assert_eq!(
            tokenize_path(r"/:id(a\)b)").unwrap(),
            vec![vec![param("id", "a)b", false, false)]]
        );
    }

    #[test]
    fn test_mixed_segment() {
        assert_eq!(
            tokenize_path("/file-:name.:ext").unwrap(),
            vec![vec![
                Token::Static("file-".into()),
                param("name", "", false, false),
                Token::Static(".".into()),
                param("ext", "", false, false),
            ]]
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            tokenize_path(r"/\:id").unwrap(),
            vec![vec![Token::Static(":id".into())]]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize_path("users"), Err(RouterError::InvalidPath { .. })));
        assert!(matches!(tokenize_path("/:id(\\d+"), Err(RouterError::InvalidPath { .. })));
        assert!(matches!(tokenize_path("/a-:b-:ids+"), Err(RouterError::InvalidPath { .. })));
        assert!(tokenize_path("/a-:ids+").is_ok());
    }
}
