//! # Content Codec
//!
//! The host store gives every entry exactly one free-text field. Structured data
//! rides along at the end of it in a tagged block the host shows as an inert macro:
//!
//! ```text
//! visible text...
//! {{//codex:JTdCJTIydHlwZSUyMiUzQS4uLg==}}
//! ```
//!
//! The payload is `base64(encodeURIComponent(JSON))`. URL-encoding first keeps the
//! payload ASCII-only, which base64 requires, and the result never contains `{` or
//! `}`, so the closing `}}` is unambiguous. The encoding must stay bit-exact with
//! what browsers produce, since other tools read and write the same blocks.
//!
//! Three block tags exist:
//!
//! - `codex:` carries [`crate::properties::CodexEntryProperties`]
//! - `codex-type:` is the older type-only form; `codex:` wins when both are present
//! - `codex-book:` carries [`crate::model::BookProperties`] on a hidden entry
//!
//! ## Failure Modes
//!
//! A block whose payload is not base64 or not URL-encoded text is treated as absent:
//! it most likely belongs to something else. A block that decodes to text but not to
//! valid JSON is a real corruption and is reported as [`CodexError::Decode`].

use std::borrow::Cow;
use std::ops::Range;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodexError, Result};

pub const PROPERTIES_TAG: &str = "codex:";
pub const TYPE_TAG: &str = "codex-type:";
pub const BOOK_TAG: &str = "codex-book:";

static PROPERTIES_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n?\{\{//codex:(.+?)\}\}").expect("valid properties block pattern")
});
static TYPE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n?\{\{//codex-type:(.+?)\}\}").expect("valid type block pattern")
});
static BOOK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n?\{\{//codex-book:(.+?)\}\}").expect("valid book block pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Properties,
    TypeOnly,
    Book,
}

/// A tagged block located inside entry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub payload: &'a str,
    /// Byte range of the whole block, including one leading newline.
    pub range: Range<usize>,
}

fn locate<'a>(re: &Regex, kind: BlockKind, content: &'a str) -> Option<Block<'a>> {
    let caps = re.captures(content)?;
    let whole = caps.get(0)?;
    let payload = caps.get(1)?;
    Some(Block {
        kind,
        payload: payload.as_str(),
        range: whole.range(),
    })
}

/// The entry-level block, `codex:` taking precedence over `codex-type:`.
pub fn find_block(content: &str) -> Option<Block<'_>> {
    locate(&PROPERTIES_BLOCK, BlockKind::Properties, content)
        .or_else(|| locate(&TYPE_BLOCK, BlockKind::TypeOnly, content))
}

/// The older type-only block, ignoring any `codex:` block.
pub fn find_type_block(content: &str) -> Option<Block<'_>> {
    locate(&TYPE_BLOCK, BlockKind::TypeOnly, content)
}

pub fn find_book_block(content: &str) -> Option<Block<'_>> {
    locate(&BOOK_BLOCK, BlockKind::Book, content)
}

/// JavaScript's `encodeURIComponent`.
pub fn encode_uri_component(text: &str) -> String {
    // urlencoding leaves only `-_.~` unescaped; browsers also keep `!*'()`.
    urlencoding::encode(text)
        .replace("%21", "!")
        .replace("%2A", "*")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
}

/// `base64(encodeURIComponent(JSON))`.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(STANDARD.encode(encode_uri_component(&json)))
}

/// Inverse of [`encode_payload`]. `Ok(None)` when the payload is not ours.
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> Result<Option<T>> {
    let Some(json) = payload_json(payload) else {
        return Ok(None);
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| CodexError::Decode(e.to_string()))
}

fn payload_json(payload: &str) -> Option<String> {
    let bytes = match STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(%err, "ignoring block with non-base64 payload");
            return None;
        }
    };
    let encoded = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            tracing::debug!("ignoring block with binary payload");
            return None;
        }
    };
    if !escapes_are_well_formed(&encoded) {
        tracing::debug!("ignoring block with malformed url encoding");
        return None;
    }
    match urlencoding::decode(&encoded) {
        Ok(Cow::Borrowed(s)) => Some(s.to_string()),
        Ok(Cow::Owned(s)) => Some(s),
        Err(err) => {
            tracing::debug!(%err, "ignoring block with malformed url encoding");
            None
        }
    }
}

/// Every `%` starts a two-digit hex escape.
fn escapes_are_well_formed(encoded: &str) -> bool {
    let bytes = encoded.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'%')
        .all(|(i, _)| {
            bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
        })
}

fn tagged<T: Serialize + ?Sized>(tag: &str, value: &T) -> Result<String> {
    Ok(format!("{{{{//{}{}}}}}", tag, encode_payload(value)?))
}

/// `{{//codex:<payload>}}`
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    tagged(PROPERTIES_TAG, value)
}

/// `{{//codex-type:<payload>}}`
pub fn encode_type<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    tagged(TYPE_TAG, value)
}

/// `{{//codex-book:<payload>}}`
pub fn encode_book<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    tagged(BOOK_TAG, value)
}

/// Decode the first `codex:` block.
pub fn decode<T: DeserializeOwned>(content: &str) -> Result<Option<T>> {
    match locate(&PROPERTIES_BLOCK, BlockKind::Properties, content) {
        Some(block) => decode_payload(block.payload),
        None => Ok(None),
    }
}

/// Decode the first `codex-type:` block.
pub fn decode_type<T: DeserializeOwned>(content: &str) -> Result<Option<T>> {
    match find_type_block(content) {
        Some(block) => decode_payload(block.payload),
        None => Ok(None),
    }
}

pub fn decode_book<T: DeserializeOwned>(content: &str) -> Result<Option<T>> {
    match find_book_block(content) {
        Some(block) => decode_payload(block.payload),
        None => Ok(None),
    }
}

/// Content with the given block removed.
pub fn strip_block(content: &str, block: &Block<'_>) -> String {
    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..block.range.start]);
    out.push_str(&content[block.range.end..]);
    out
}

/// Content without its entry-level block.
pub fn strip(content: &str) -> String {
    match find_block(content) {
        Some(block) => strip_block(content, &block),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn encodes_like_the_browser() {
        assert_eq!(
            encode_uri_component(r#"{"a":"b c!*'()~"}"#),
            "%7B%22a%22%3A%22b%20c!*'()~%22%7D"
        );
        assert_eq!(encode_uri_component("é"), "%C3%A9");
        // btoa(encodeURIComponent('{"a":1}'))
        assert_eq!(encode_payload(&json!({"a": 1})).unwrap(), "JTdCJTIyYSUyMiUzQTElN0Q=");
    }

    #[test]
    fn round_trips_values_with_braces() {
        let value = json!({"content": "{{getvar::hp}} } {", "n": [1, 2]});
        let block = encode(&value).unwrap();
        assert!(block.starts_with("{{//codex:"));
        assert!(block.ends_with("}}"));

        let content = format!("Visible text\n{}", block);
        let decoded: Value = decode(&content).unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn reencoding_is_byte_identical() {
        let original = r#"{"titleField":"comment","type":{"id":"t1","name":"NPC"}}"#;
        let payload = STANDARD.encode(encode_uri_component(original));
        let value: Value = decode_payload(&payload).unwrap().unwrap();
        assert_eq!(encode_payload(&value).unwrap(), payload);
    }

    #[test]
    fn absent_block_decodes_to_none() {
        let decoded: Option<Value> = decode("just text").unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn foreign_block_is_ignored() {
        let decoded: Option<Value> = decode("text {{//codex:not*base64}}").unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn malformed_escapes_are_not_our_block() {
        for encoded in ["%7B%ZZ%7D", "%7B%7D%", "%7B%4"] {
            let payload = STANDARD.encode(encoded);
            let decoded: Option<Value> = decode(&format!("text {{{{//codex:{}}}}}", payload)).unwrap();
            assert!(decoded.is_none(), "{}", encoded);
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        let payload = STANDARD.encode(encode_uri_component("{not json"));
        let content = format!("x{{{{//codex:{}}}}}", payload);
        let err = decode::<Value>(&content).unwrap_err();
        assert!(matches!(err, CodexError::Decode(_)));
    }

    #[test]
    fn properties_block_takes_precedence() {
        let type_block = encode_type(&json!({"id": "old"})).unwrap();
        let props_block = encode(&json!({"type": {"id": "new"}})).unwrap();
        let content = format!("x\n{}\n{}", type_block, props_block);

        let block = find_block(&content).unwrap();
        assert_eq!(block.kind, BlockKind::Properties);
        assert_eq!(strip_block(&content, &block), format!("x\n{}", type_block));
    }

    #[test]
    fn strip_removes_leading_newline() {
        let block = encode(&json!({})).unwrap();
        assert_eq!(strip(&format!("Body\n{}", block)), "Body");
    }
}
