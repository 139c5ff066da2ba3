//! Extraction of JSON values embedded in free-form model output.
//!
//! Models often wrap the requested JSON in commentary or code fences. The
//! helpers here locate the first balanced `{...}` or `[...]` construct that
//! parses as JSON and hand it back.

use serde_json::Value;
use thiserror::Error;

/// Why no JSON value could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("response is empty")]
    Empty,

    #[error("no JSON value found in response")]
    NotFound,

    #[error("unbalanced JSON starting at byte {0}")]
    Unbalanced(usize),

    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// Extract the first balanced JSON object or array that parses.
///
/// Candidates that are balanced but fail to parse (e.g. `{placeholder}` in
/// prose) are skipped and the scan continues after their opening bracket.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let mut last_error = ExtractError::NotFound;
    let mut offset = 0;

    while let Some(rel) = text[offset..].find(['{', '[']) {
        let start = offset + rel;
        match balanced_end(text, start) {
            Some(end) => match serde_json::from_str::<Value>(&text[start..end]) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = ExtractError::Invalid(e.to_string()),
            },
            None => {
                if matches!(last_error, ExtractError::NotFound) {
                    last_error = ExtractError::Unbalanced(start);
                }
            }
        }
        offset = start + 1;
    }

    Err(last_error)
}

/// Return the array a response carries, either bare or wrapped in an object.
///
/// Objects are searched for the first of `keys`, then for a single
/// array-valued field.
pub fn into_array(value: Value, keys: &[&str]) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in keys {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Some(items),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Byte index one past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
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
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
