//! Best-effort recovery of JSON from free-form model replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::util::extract_balanced;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Remove `<think>…</think>` reasoning blocks emitted by reasoning models.
pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

/// Find and parse a JSON value inside `text`.
///
/// Tried in order: the whole text, a ```` ```json ```` fence, any ```` ``` ````
/// fence, the first-`[`-to-last-`]` span, the first balanced object, and the
/// first-`{`-to-last-`}` span. Returns `None` when nothing parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();

    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    if let Some(inner) = fenced(text, "```json").or_else(|| fenced(text, "```")) {
        if let Ok(value) = serde_json::from_str(inner) {
            return Some(value);
        }
    }

    if let Some(value) = outer_span(text, '[', ']').and_then(|s| serde_json::from_str(s).ok()) {
        return Some(value);
    }

    if let Some(value) =
        extract_balanced(text, '{', '}').and_then(|s| serde_json::from_str(s).ok())
    {
        return Some(value);
    }

    outer_span(text, '{', '}').and_then(|s| serde_json::from_str(s).ok())
}

fn fenced<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..end + close.len_utf8()])
}
