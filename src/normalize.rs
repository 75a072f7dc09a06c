//! Normalization of OCR/LLM numeric values.
//!
//! Models routinely hand back amounts as strings such as `"₹2,50,000"`,
//! `"$1,234.56"` or `"■ 1,20,000"`. Everything numeric in a
//! [`StructuredDocument`](crate::StructuredDocument) passes through
//! [`clean_number`] during deserialization, so downstream code only ever sees
//! a finite `f64` or `None`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Characters that are never part of a number: currency symbols, OCR bullet
/// glyphs and table pipes.
const NOISE_CHARS: &[char] = &['₹', '$', ',', '■', '●', '•', '|'];

/// Rupee prefixes written out in text, longest first so `Rs.` wins over `Rs`.
const CURRENCY_PREFIXES: &[&str] = &["inr", "rs.", "rs"];

/// Converts a loosely formatted value into a finite number.
///
/// - `null`, `""` and unparsable text become `None` (never `0.0`)
/// - numbers pass through as `f64`
/// - strings are stripped of currency symbols, thousands separators, OCR
///   noise and whitespace before parsing
pub fn clean_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => clean_number_str(s),
        _ => None,
    }
}

/// String form of [`clean_number`].
pub fn clean_number_str(raw: &str) -> Option<f64> {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !NOISE_CHARS.contains(c))
        .collect();

    let stripped = strip_currency_prefix(&stripped);
    if stripped.is_empty() {
        return None;
    }

    // Only the first '.' is a decimal marker; anything after a second one is dropped.
    let mut parts = stripped.split('.');
    let whole = parts.next().unwrap_or_default();
    let candidate = match parts.next() {
        Some(fraction) => format!("{}.{}", whole, fraction),
        None => whole.to_string(),
    };

    candidate.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Drops a leading `Rs`, `Rs.` or `INR` token, ignoring case.
fn strip_currency_prefix(text: &str) -> &str {
    for prefix in CURRENCY_PREFIXES {
        if let Some(head) = text.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return &text[prefix.len()..];
            }
        }
    }
    text
}

/// Serde adapter for numeric leaves: `#[serde(default, deserialize_with = "lenient_number")]`.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(clean_number(&value))
}

/// Serde adapter for text leaves. Models sometimes emit account numbers or
/// years as JSON numbers; those are kept as their textual form. Blank text
/// becomes `None`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Serde adapter for flags the model may return as `"true"`, `1` or `null`.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Some(true),
            "false" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Serde adapter treating `null` (or a wrongly-typed scalar) as the default
/// value, typically for arrays and nested objects.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for lists of free-form items (findings, clauses, risks).
/// Accepts an array, a single string, or `null`.
pub fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
        Value::String(s) if !s.trim().is_empty() => vec![Value::String(s)],
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    })
}

/// Renders a free-form list item as display text.
pub fn item_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            for key in ["description", "finding", "text", "title", "name", "term", "clause"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return s.clone();
                }
            }
            value.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_number_strips_currency() {
        assert_eq!(clean_number(&json!("₹2,50,000")), Some(250000.0));
        assert_eq!(clean_number(&json!("$1,234.56")), Some(1234.56));
        assert_eq!(clean_number(&json!("■ 1,20,000")), Some(120000.0));
        assert_eq!(clean_number(&json!("| 5 000 |")), Some(5000.0));
        assert_eq!(clean_number(&json!("-450.50")), Some(-450.5));
    }

    #[test]
    fn test_clean_number_strips_written_rupee_prefix() {
        assert_eq!(clean_number(&json!("Rs. 1,500")), Some(1500.0));
        assert_eq!(clean_number(&json!("Rs 2,50,000.50")), Some(250000.5));
        assert_eq!(clean_number(&json!("INR 2,50,000.50")), Some(250000.5));
        assert_eq!(clean_number(&json!("rs.75.25")), Some(75.25));
        assert_eq!(clean_number(&json!("Rs.")), None);
    }

    #[test]
    fn test_clean_number_preserves_null() {
        assert_eq!(clean_number(&Value::Null), None);
        assert_eq!(clean_number(&json!("")), None);
        assert_eq!(clean_number(&json!("   ")), None);
        assert_eq!(clean_number(&json!("N/A")), None);
        assert_eq!(clean_number(&json!("NaN")), None);
        assert_eq!(clean_number(&json!("inf")), None);
        assert_eq!(clean_number(&json!(true)), None);
        assert_eq!(clean_number(&json!(["1"])), None);
    }

    #[test]
    fn test_clean_number_numeric_passthrough() {
        assert_eq!(clean_number(&json!(42)), Some(42.0));
        assert_eq!(clean_number(&json!(0)), Some(0.0));
        assert_eq!(clean_number(&json!(12.75)), Some(12.75));
    }

    #[test]
    fn test_clean_number_second_decimal_point_is_dropped() {
        assert_eq!(clean_number_str("1.234.56"), Some(1.234));
    }

    #[test]
    fn test_clean_number_is_idempotent() {
        let inputs = [
            json!("₹2,50,000"),
            json!("$1,234.56"),
            json!(""),
            json!(null),
            json!("garbage"),
            json!(99.5),
            json!("0"),
        ];
        for input in inputs {
            let once = clean_number(&input);
            let as_value = once.map(Value::from).unwrap_or(Value::Null);
            assert_eq!(clean_number(&as_value), once, "input {:?}", input);
        }
    }

    #[derive(Debug, serde::Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "lenient_number")]
        amount: Option<f64>,
        #[serde(default, deserialize_with = "lenient_string")]
        account: Option<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: Option<bool>,
    }

    #[test]
    fn test_lenient_adapters() {
        let sample: Sample = serde_json::from_value(json!({
            "amount": "₹ 1,500",
            "account": 123456,
            "tags": null,
            "flag": "TRUE"
        }))
        .unwrap();
        assert_eq!(sample.amount, Some(1500.0));
        assert_eq!(sample.account.as_deref(), Some("123456"));
        assert!(sample.tags.is_empty());
        assert_eq!(sample.flag, Some(true));

        let missing: Sample = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.amount, None);
        assert_eq!(missing.account, None);
        assert_eq!(missing.flag, None);
    }

    #[test]
    fn test_item_text() {
        assert_eq!(item_text(&json!("Late filing")), "Late filing");
        assert_eq!(item_text(&json!({"finding": "Cash shortfall"})), "Cash shortfall");
    }
}
