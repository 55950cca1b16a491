//! Helpers for parsing structured answers out of agent output.
//!
//! Agents frequently wrap JSON in markdown fences or surround it with
//! prose; the extractors here tolerate both.

/// Extract the first JSON object or array from free-form agent output.
///
/// Handles markdown code fences (```json ... ```) and balanced-brace
/// scanning through string literals. Returns the raw JSON slice.
pub fn extract_json(text: &str) -> Option<String> {
    // Prefer a fenced block when present.
    if let Some(fenced) = extract_fenced(text) {
        if let Some(json) = extract_balanced(&fenced) {
            return Some(json);
        }
    }
    extract_balanced(text)
}

fn extract_fenced(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an optional language tag up to the end of the line.
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].to_string())
}

fn extract_balanced(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start] as char;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if !in_string && c == open => depth += 1,
            c if !in_string && c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        let json = extract_json(r#"{"verdict": "pass"}"#).unwrap();
        assert_eq!(json, r#"{"verdict": "pass"}"#);
    }

    #[test]
    fn fenced_object_with_language_tag() {
        let text = "Here is my answer:\n```json\n{\"verdict\": \"fail\"}\n```\nDone.";
        let json = extract_json(text).unwrap();
        assert_eq!(json.trim(), r#"{"verdict": "fail"}"#);
    }

    #[test]
    fn object_surrounded_by_prose() {
        let text = "I looked at the code. {\"a\": {\"nested\": true}} Hope that helps!";
        let json = extract_json(text).unwrap();
        assert_eq!(json, r#"{"a": {"nested": true}}"#);
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let text = r#"{"msg": "use {braces} carefully", "ok": true}"#;
        let json = extract_json(text).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());
    }

    #[test]
    fn arrays_extract_too() {
        let text = "tasks:\n```\n[{\"id\": \"a.b\"}]\n```";
        let json = extract_json(text).unwrap();
        assert_eq!(json.trim(), r#"[{"id": "a.b"}]"#);
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json("nothing here").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json("unbalanced { brace").is_none());
    }
}
