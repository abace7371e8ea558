//! Lenient JSON extraction from model responses.
//!
//! Responses often wrap JSON in markdown code fences, or surround it with
//! prose. These helpers pull out whatever parses and return nothing (rather
//! than an error) when nothing does.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is valid")
});

/// Every parseable fenced block, in order. With no fenced blocks, the whole
/// trimmed text is tried. Never fails; unparseable input yields an empty Vec.
pub fn extract_json(text: &str) -> Vec<Value> {
    let mut saw_block = false;
    let mut found = Vec::new();
    for caps in FENCED_BLOCK.captures_iter(text) {
        saw_block = true;
        if let Some(body) = caps.get(1) {
            if let Ok(v) = serde_json::from_str::<Value>(body.as_str().trim()) {
                found.push(v);
            }
        }
    }
    if !saw_block {
        if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
            found.push(v);
        }
    }
    found
}

/// First extracted value that is a JSON object.
pub fn extract_first_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    extract_json(text).into_iter().find_map(|v| match v {
        Value::Object(map) => Some(map),
        _ => None,
    })
}
