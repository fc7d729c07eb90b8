//! Lenient JSON decoding of model output
//!
//! Model replies are unreliable: prose around the JSON, code fences, or no
//! JSON at all. Decoding tries the whole text first, then the widest
//! `{...}` / `[...]` span, and otherwise reports a [`DecodeError`] that
//! callers turn into an empty default. Nothing here is meant to be strict.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Model output that held no usable JSON
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no JSON {0} found in model output")]
    NotFound(&'static str),

    #[error("JSON {0} span did not parse")]
    Malformed(&'static str),
}

fn object_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

fn array_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("static regex"))
}

fn decode_with(content: &str, span: &Regex, kind: &'static str) -> Result<Value, DecodeError> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        return Ok(value);
    }

    let matched = span.find(content).ok_or(DecodeError::NotFound(kind))?;
    serde_json::from_str(matched.as_str()).map_err(|_| DecodeError::Malformed(kind))
}

/// Decode a JSON object out of free text
pub fn decode_object(content: &str) -> Result<Map<String, Value>, DecodeError> {
    match decode_with(content, object_span(), "object")? {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::NotFound("object")),
    }
}

/// Decode a JSON array out of free text.
///
/// An object wrapping a single array field (`{"keywords": [...]}`) is
/// accepted too, since chat models like to add one.
pub fn decode_array(content: &str) -> Result<Vec<Value>, DecodeError> {
    match decode_with(content, array_span(), "array")? {
        Value::Array(items) => Ok(items),
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or(DecodeError::NotFound("array")),
        _ => Err(DecodeError::NotFound("array")),
    }
}

/// Object decode that degrades to an empty map
pub fn object_or_default(content: &str) -> Map<String, Value> {
    decode_object(content).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Model output degraded to empty object");
        Map::new()
    })
}

/// Array decode that degrades to an empty list
pub fn array_or_default(content: &str) -> Vec<Value> {
    decode_array(content).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Model output degraded to empty array");
        Vec::new()
    })
}
