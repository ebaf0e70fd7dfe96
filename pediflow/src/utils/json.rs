//! Lenient extraction of a JSON document from completion text.
//!
//! Models wrap JSON in markdown fences or surround it with prose. Only the
//! envelope is forgiven here; the shape check happens in the payload decoders.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").ok());

/// Returns the contents of the first fenced code block, or the trimmed text.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| text.trim(), |m| m.as_str())
}

/// Parses completion text as JSON.
///
/// Tries the fenced or trimmed text first, then the outermost `{ ... }` span.
///
/// # Errors
///
/// Returns the parse error of the last attempt when neither yields JSON.
pub fn parse_json_block(text: &str) -> Result<Value, serde_json::Error> {
    let body = strip_code_fences(text);
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(err) => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
            _ => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(parse_json_block(r#" {"a": 1} "#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json() {
        let text = "Sure!\n```json\n{\"a\": [1, 2]}\n```\nAnything else?";
        assert_eq!(strip_code_fences(text), "{\"a\": [1, 2]}");
        assert_eq!(parse_json_block(text).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_embedded_object() {
        let text = "The result is {\"ok\": true} as requested.";
        assert_eq!(parse_json_block(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_not_json() {
        assert!(parse_json_block("no braces here").is_err());
        assert!(parse_json_block("} reversed {").is_err());
    }
}
