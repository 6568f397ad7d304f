//! Best-effort extraction of a structured span from free-form model output
//!
//! The collaborator is asked for pure JSON but routinely wraps it in prose
//! or a markdown code fence. These helpers locate the outermost structural
//! delimiters and hand back the span for typed parsing; callers apply their
//! documented fallback when no span is found or the span fails to parse.
//! Deliberately not generalized further: this is the boundary adapter for a
//! non-deterministic collaborator.

/// Strip a leading ```/```json code fence, if present
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Skip the fence's language tag line
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.rfind("```") {
                return body[..end].trim();
            }
        }
    }
    text
}

/// Extract the first `{...}` span from free-form text
#[must_use]
pub fn extract_json_object(text: &str) -> Option<String> {
    let text = strip_code_fence(text);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].to_string())
}

/// Extract the first `[...]` span from free-form text
#[must_use]
pub fn extract_json_array(text: &str) -> Option<String> {
    let text = strip_code_fence(text);
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bare_object() {
        let span = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(span, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extracts_object_embedded_in_prose() {
        let text = "Here is the analysis you asked for:\n{\"a\": 1}\nHope that helps!";
        assert_eq!(extract_json_object(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extracts_fenced_object() {
        let text = "```json\n{\"score\": 72.0}\n```";
        assert_eq!(extract_json_object(text).unwrap(), "{\"score\": 72.0}");
    }

    #[test]
    fn test_no_object_found() {
        assert_eq!(extract_json_object("no structure here"), None);
        assert_eq!(extract_json_object("only an opening {"), None);
    }

    #[test]
    fn test_extracts_array() {
        let text = "Tips below.\n[\"tip one\", \"tip two\"]";
        assert_eq!(
            extract_json_array(text).unwrap(),
            "[\"tip one\", \"tip two\"]"
        );
    }

    #[test]
    fn test_array_inside_fence() {
        let text = "```\n[\"a\"]\n```";
        assert_eq!(extract_json_array(text).unwrap(), "[\"a\"]");
    }
}
