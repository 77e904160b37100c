//! Helpers for strings that carry JSON.

use serde_json::Value;

/// True when the trimmed text opens like a JSON object or array.
pub fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Parse `text` as JSON, returning `None` instead of an error.
pub fn parse_lenient(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Best-effort classification of why a JSON-looking string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDiagnosis {
    pub hint: String,
    pub suggestion: String,
}

pub fn diagnose_malformed_json(text: &str) -> JsonDiagnosis {
    let trimmed = text.trim();

    if trimmed.contains('\'') && !trimmed.contains('"') {
        return JsonDiagnosis {
            hint: "single quotes are used instead of double quotes".to_string(),
            suggestion: "use double quotes for JSON keys and strings, e.g. {\"key\": \"value\"}"
                .to_string(),
        };
    }

    let open_braces = trimmed.matches('{').count();
    let close_braces = trimmed.matches('}').count();
    if open_braces != close_braces {
        return JsonDiagnosis {
            hint: format!(
                "mismatched braces ({} '{{' vs {} '}}')",
                open_braces, close_braces
            ),
            suggestion: "make sure every '{' has a matching '}'".to_string(),
        };
    }

    let open_brackets = trimmed.matches('[').count();
    let close_brackets = trimmed.matches(']').count();
    if open_brackets != close_brackets {
        return JsonDiagnosis {
            hint: format!(
                "mismatched brackets ({} '[' vs {} ']')",
                open_brackets, close_brackets
            ),
            suggestion: "make sure every '[' has a matching ']'".to_string(),
        };
    }

    if has_trailing_comma(trimmed) {
        return JsonDiagnosis {
            hint: "trailing comma before a closing brace or bracket".to_string(),
            suggestion: "remove the comma after the last element".to_string(),
        };
    }

    JsonDiagnosis {
        hint: "the value is not valid JSON".to_string(),
        suggestion: "validate the value with a JSON linter or pass a structured value instead of a string"
            .to_string(),
    }
}

fn has_trailing_comma(text: &str) -> bool {
    let mut pending_comma = false;
    for ch in text.chars() {
        match ch {
            ',' => pending_comma = true,
            '}' | ']' if pending_comma => return true,
            c if c.is_whitespace() => {}
            _ => pending_comma = false,
        }
    }
    false
}
