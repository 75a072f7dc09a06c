//! Recovery of JSON from model output that ignored the "JSON only" rule.

use crate::error::{FinancialDocumentError, Result};
use crate::utils::truncate_chars;
use serde_json::Value;

const PREVIEW_CHARS: usize = 500;

/// Removes a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ```` fence.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```JSON") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parses model output as JSON, tolerating code fences and surrounding
/// prose.
///
/// Tries, in order: the text as-is, the text without code fences, then the
/// widest `{...}` and `[...]` spans (longest first). Fails with
/// [`FinancialDocumentError::MalformedModelOutput`] carrying a preview of the
/// text; never substitutes an empty value.
pub fn parse_json_lenient(text: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let unfenced = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let mut spans: Vec<&str> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|&(open, close)| span_between(unfenced, open, close))
        .collect();
    spans.sort_by_key(|span| std::cmp::Reverse(span.len()));

    for span in spans {
        if let Ok(value) = serde_json::from_str(span) {
            return Ok(value);
        }
    }

    Err(FinancialDocumentError::MalformedModelOutput {
        reason: if text.trim().is_empty() {
            "empty response".to_string()
        } else {
            "no valid JSON object or array found".to_string()
        },
        preview: truncate_chars(text, PREVIEW_CHARS).to_string(),
    })
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_json() {
        assert_eq!(parse_json_lenient("```json\n{\"a\":1}\n```").unwrap(), json!({"a": 1}));
        assert_eq!(parse_json_lenient("```\n[1, 2]\n```").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_prose_wrapped_json() {
        assert_eq!(
            parse_json_lenient("Here is the result: {\"a\":1} Thanks!").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_json_lenient("Sure!\n{\n  \"rows\": [1, 2]\n}\nLet me know.").unwrap(),
            json!({"rows": [1, 2]})
        );
    }

    #[test]
    fn test_array_span_when_object_span_is_invalid() {
        assert_eq!(
            parse_json_lenient("Transactions: [{\"a\": 1}, {\"a\": 2}] end").unwrap(),
            json!([{"a": 1}, {"a": 2}])
        );
    }

    #[test]
    fn test_unrecoverable_output_carries_preview() {
        let long = format!("I could not read the document. {}", "x".repeat(2000));
        match parse_json_lenient(&long) {
            Err(FinancialDocumentError::MalformedModelOutput { preview, .. }) => {
                assert_eq!(preview.chars().count(), 500);
                assert!(preview.starts_with("I could not read"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(parse_json_lenient("{\"a\": 1").is_err());
        assert!(parse_json_lenient("").is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }
}
