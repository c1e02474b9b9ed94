//! Reply parsing: raw model text → `serde_json::Value`.
//!
//! JSON-object mode usually yields bare JSON, but some hosted models still
//! wrap it in ```` ```json ```` fences or add a stray BOM. This module strips
//! those artefacts and parses what remains. It does not check the shape of
//! the value; whatever JSON the model produced is kept as-is.

use crate::error::MedExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Remove an outer code fence and surrounding invisible characters.
pub fn strip_reply_wrapping(raw: &str) -> &str {
    let trimmed =
        raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}' || c == '\u{200B}');
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str().trim()),
        None => trimmed,
    }
}

/// Parse a model reply as JSON. `context` names the page or file for errors.
pub fn parse_json_reply(raw: &str, context: &str) -> Result<Value, MedExtractError> {
    serde_json::from_str(strip_reply_wrapping(raw)).map_err(|e| MedExtractError::MalformedReply {
        context: context.to_string(),
        detail: e.to_string(),
    })
}
