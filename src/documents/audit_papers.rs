use super::FinancialDocument;
use crate::metrics::DerivedMetrics;
use crate::normalize::{clean_number, lenient_list, lenient_string};
use crate::schema::DocumentType;
use crate::utils::sum_present;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AuditPapers {
    #[serde(default, deserialize_with = "lenient_string")]
    pub audit_period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Statutory, internal, tax, ...")]
    pub audit_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub auditor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    #[schemars(description = "Each finding as text or {finding, area, amount, severity}")]
    pub key_findings: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    #[schemars(description = "Proposed or booked adjustments as {description, account, amount}")]
    pub adjustments: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Unqualified, qualified, adverse or disclaimer, with the auditor's wording")]
    pub audit_opinion: Option<String>,
}

impl AuditPapers {
    /// Net amount of all adjustments that carry one.
    pub fn adjustments_total(&self) -> Option<f64> {
        sum_present(
            self.adjustments
                .iter()
                .map(|adj| adj.get("amount").and_then(clean_number)),
        )
    }
}

impl FinancialDocument for AuditPapers {
    const DOCUMENT_TYPE: DocumentType = DocumentType::AuditPapers;

    fn extraction_rules() -> &'static str {
        r#"- Extract findings, adjustments and recommendations as separate lists, in the order they appear.
- Keep amounts on adjustments as numbers.
- Quote the audit opinion paragraph rather than summarizing it."#
    }

    fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics::builder()
            .table(
                "counts",
                json!({
                    "key_findings": self.key_findings.len(),
                    "adjustments": self.adjustments.len(),
                    "recommendations": self.recommendations.len(),
                }),
            )
            .ratio("adjustments_total", self.adjustments_total())
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_accept_strings_and_objects() {
        let audit = AuditPapers::from_model_value(json!({
            "entity_name": "Acme",
            "key_findings": "Inventory not physically verified",
            "adjustments": [
                {"description": "Depreciation short provided", "amount": "₹12,500"},
                {"description": "Reclassify advance"}
            ],
            "recommendations": null
        }))
        .unwrap();

        assert_eq!(audit.key_findings.len(), 1);
        assert!(audit.recommendations.is_empty());
        assert_eq!(audit.adjustments_total(), Some(12500.0));
        assert_eq!(audit.metrics().tables["counts"]["adjustments"], json!(2));
    }
}
