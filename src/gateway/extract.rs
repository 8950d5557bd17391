//! JSON extraction from model output
//!
//! Models are asked for pure JSON but frequently wrap it in code fences or
//! prose. Strategy: strip fences, try a strict parse, then recover the first
//! balanced object or array from the text.

use serde_json::Value;

use super::provider::ModelError;

const SNIPPET_LEN: usize = 120;

/// Extract a JSON value from raw model text
pub fn extract_json(text: &str) -> Result<Value, ModelError> {
    let stripped = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped.trim()) {
        return Ok(value);
    }

    if let Some(candidate) = balanced_slice(&stripped) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }
    }

    Err(ModelError::MalformedOutput {
        snippet: snippet(text),
    })
}

/// Remove a surrounding ``` or ```json fence, if present
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = trimmed
        .trim_start_matches("```")
        .trim_start_matches("json")
        .trim_start_matches("JSON");
    without_open
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Find the first balanced `{...}` or `[...]` slice, honoring strings
fn balanced_slice(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find(|c| c == '{' || c == '[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > SNIPPET_LEN {
        trimmed.chars().take(SNIPPET_LEN).collect()
    } else {
        trimmed.to_string()
    }
}
