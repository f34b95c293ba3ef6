//! Extraction of JSON payloads from completion output.
//!
//! Completion responses are plain text and often wrap the JSON payload in
//! prose or markdown code fences. Rather than demanding structured output,
//! callers scan for the outermost brace span.

/// Extract the substring between the first `{` and the last `}` of `text`.
///
/// Returns `None` when no such span exists. The returned slice is not
/// guaranteed to be valid JSON; callers parse it and handle failure.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_prose_around_object() {
        let text = r#"Sure! Here is the JSON you asked for: {"a": 1} Hope it helps."#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_markdown_code_fence() {
        let text = "```json\n{\n  \"queries\": []\n}\n```";
        assert_eq!(extract_json_object(text), Some("{\n  \"queries\": []\n}"));
    }

    #[test]
    fn test_nested_objects_span_outermost() {
        let text = r#"{"outer": {"inner": 2}}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object(""), None);
    }

    #[test]
    fn test_only_open_brace() {
        assert_eq!(extract_json_object("{ unterminated"), None);
    }

    #[test]
    fn test_close_before_open() {
        assert_eq!(extract_json_object("} before {"), None);
    }
}
