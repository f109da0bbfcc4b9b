//! Percent encoding for the parts of a location.
//!
//! Params are encoded before a path is built and decoded after a path is
//! matched, so user code only ever sees decoded values. Query strings go
//! through `url::form_urlencoded`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

/// Everything outside the `encodeURI` set is escaped.
const URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b',')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'|')
    .remove(b'[')
    .remove(b']');

const PARAM: &AsciiSet = URI;

const PATH: &AsciiSet = &URI.remove(b'/');

const HASH: &AsciiSet = &URI
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'{')
    .remove(b'}')
    .remove(b'^');

/// Encode a path, keeping `/`.
pub fn encode_path(text: &str) -> String {
    utf8_percent_encode(text, PATH).to_string()
}

/// Encode a single param value; `/` is encoded too.
pub fn encode_param(text: &str) -> String {
    utf8_percent_encode(text, PARAM).to_string()
}

/// Encode a hash, including its leading `#`.
pub fn encode_hash(text: &str) -> String {
    utf8_percent_encode(text, HASH).to_string()
}

/// Encode a query key or value. Spaces become `+`.
pub fn encode_query(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Percent-decode `text`. A `%` not followed by two hex digits is kept as
/// is; input that does not decode to UTF-8 is returned unchanged.
pub fn decode(text: &str) -> String {
    match percent_decode_str(text).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            tracing::warn!(text = %text, "Error decoding \"{}\". Using original value", text);
            text.to_string()
        }
    }
}
