use chrono::NaiveDate;

/// Parses a strict ISO `YYYY-MM-DD` date. Anything else is `None`.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Returns the `YYYY-MM` bucket for an ISO date, or `None` for malformed or
/// missing dates so that aggregations can skip them.
pub fn month_bucket(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_iso_date)
        .map(|date| date.format("%Y-%m").to_string())
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Receivable aging bucket for an age in days.
pub fn aging_bucket(age_in_days: i64) -> &'static str {
    match age_in_days {
        i64::MIN..=30 => "0-30",
        31..=60 => "31-60",
        61..=90 => "61-90",
        _ => "90+",
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator` rounded to two places, only when both sides
/// are known and the denominator is positive.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(round2(n / d)),
        _ => None,
    }
}

/// Same as [`ratio`] but expressed as a percentage.
pub fn percentage(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(round2(n / d * 100.0)),
        _ => None,
    }
}

/// Sum of the values that are present; `None` when none are.
pub fn sum_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// `a - b` when both are known.
pub fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    }
}

/// Truncates to at most `max_chars` characters without splitting a UTF-8
/// sequence (OCR text is full of `₹` and box-drawing glyphs).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bucket_skips_malformed() {
        assert_eq!(month_bucket(Some("2024-01-05")), Some("2024-01".to_string()));
        assert_eq!(month_bucket(Some("05/01/2024")), None);
        assert_eq!(month_bucket(Some("")), None);
        assert_eq!(month_bucket(None), None);
    }

    #[test]
    fn test_aging_bucket() {
        assert_eq!(aging_bucket(-4), "0-30");
        assert_eq!(aging_bucket(30), "0-30");
        assert_eq!(aging_bucket(31), "31-60");
        assert_eq!(aging_bucket(90), "61-90");
        assert_eq!(aging_bucket(91), "90+");
    }

    #[test]
    fn test_days_between() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_between(from, to), 30);
        assert_eq!(days_between(to, from), -30);
    }

    #[test]
    fn test_ratio_requires_positive_denominator() {
        assert_eq!(ratio(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(ratio(Some(10.0), Some(0.0)), None);
        assert_eq!(ratio(None, Some(4.0)), None);
        assert_eq!(percentage(Some(1.0), Some(3.0)), Some(33.33));
    }

    #[test]
    fn test_sum_present() {
        assert_eq!(sum_present([Some(1.0), None, Some(2.5)]), Some(3.5));
        assert_eq!(sum_present([None, None]), None);
        assert_eq!(sum_present(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "₹₹₹abc";
        assert_eq!(truncate_chars(text, 2), "₹₹");
        assert_eq!(truncate_chars(text, 10), text);
        assert_eq!(truncate_chars("", 3), "");
    }
}
