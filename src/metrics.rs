//! Dashboard-style derived metrics shared by every document type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Read-only view derived from a normalized document: tables, chart series
/// and ratios. Ratios that cannot be computed from the extracted data are
/// `None`, never a placeholder zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub tables: BTreeMap<String, Value>,
    pub charts: BTreeMap<String, Value>,
    pub ratios: BTreeMap<String, Option<f64>>,
    /// Some metrics (growth, trends) only become meaningful once several
    /// periods of the same document type have been processed.
    pub requires_multiple_documents: bool,
}

impl DerivedMetrics {
    pub fn builder() -> MetricsBuilder {
        MetricsBuilder::default()
    }

    pub fn ratio(&self, name: &str) -> Option<f64> {
        self.ratios.get(name).copied().flatten()
    }
}

#[derive(Debug, Default)]
pub struct MetricsBuilder {
    metrics: DerivedMetrics,
}

impl MetricsBuilder {
    pub fn table(mut self, name: &str, value: impl Serialize) -> Self {
        self.metrics.tables.insert(name.to_string(), to_value(value));
        self
    }

    pub fn chart(mut self, name: &str, value: impl Serialize) -> Self {
        self.metrics.charts.insert(name.to_string(), to_value(value));
        self
    }

    pub fn ratio(mut self, name: &str, value: Option<f64>) -> Self {
        self.metrics
            .ratios
            .insert(name.to_string(), value.filter(|v| v.is_finite()));
        self
    }

    pub fn requires_multiple_documents(mut self, required: bool) -> Self {
        self.metrics.requires_multiple_documents = required;
        self
    }

    pub fn build(self) -> DerivedMetrics {
        self.metrics
    }
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// A labelled amount used in breakdown tables and pie charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

/// Sums amounts per category, keeping categories in first-seen order.
/// Entries without an amount are skipped; a missing category falls back to
/// `fallback`.
pub fn category_totals<'a, I>(entries: I, fallback: &str) -> Vec<CategoryAmount>
where
    I: IntoIterator<Item = (Option<&'a str>, Option<f64>)>,
{
    let mut totals: Vec<CategoryAmount> = Vec::new();
    for (category, amount) in entries {
        let Some(amount) = amount else { continue };
        let label = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(fallback);
        match totals.iter_mut().find(|t| t.category == label) {
            Some(existing) => existing.amount += amount,
            None => totals.push(CategoryAmount {
                category: label.to_string(),
                amount,
            }),
        }
    }
    totals
}

/// Builds a breakdown list from labelled optional amounts, dropping the
/// labels whose amount was not extracted.
pub fn present_amounts(entries: &[(&str, Option<f64>)]) -> Vec<CategoryAmount> {
    entries
        .iter()
        .filter_map(|(label, amount)| {
            amount.map(|amount| CategoryAmount {
                category: label.to_string(),
                amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_drops_non_finite_ratios() {
        let metrics = DerivedMetrics::builder()
            .table("rows", vec![1, 2, 3])
            .chart("pie", json!({"a": 1}))
            .ratio("good", Some(1.5))
            .ratio("bad", Some(f64::NAN))
            .ratio("missing", None)
            .requires_multiple_documents(true)
            .build();

        assert_eq!(metrics.tables["rows"], json!([1, 2, 3]));
        assert_eq!(metrics.ratio("good"), Some(1.5));
        assert_eq!(metrics.ratio("bad"), None);
        assert!(metrics.ratios.contains_key("missing"));
        assert!(metrics.requires_multiple_documents);
    }

    #[test]
    fn test_category_totals_preserve_first_seen_order() {
        let totals = category_totals(
            vec![
                (Some("Rent"), Some(100.0)),
                (None, Some(5.0)),
                (Some("Food"), Some(20.0)),
                (Some("Rent"), Some(50.0)),
                (Some("Food"), None),
            ],
            "Other",
        );
        assert_eq!(
            totals,
            vec![
                CategoryAmount { category: "Rent".into(), amount: 150.0 },
                CategoryAmount { category: "Other".into(), amount: 5.0 },
                CategoryAmount { category: "Food".into(), amount: 20.0 },
            ]
        );
    }

    #[test]
    fn test_present_amounts() {
        let items = present_amounts(&[("CGST", Some(9.0)), ("SGST", None)]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "CGST");
    }
}
