use super::{lenient_rows, FinancialDocument};
use crate::metrics::{category_totals, DerivedMetrics};
use crate::normalize::{lenient_list, lenient_string};
use crate::schema::DocumentType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AgreementContract {
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub parties: Vec<ContractParty>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Term or validity as written, e.g. '3 years from 2024-04-01'")]
    pub validity_period: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    #[schemars(description = "Key clauses as text or {clause, description}")]
    pub key_terms: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub obligations: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    #[schemars(description = "Risks as text or {risk, risk_level, mitigation}")]
    pub risks: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub compliance_requirements: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContractParty {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
}

impl AgreementContract {
    /// Risk level of a risk entry, when the model tagged one.
    pub fn risk_level(risk: &Value) -> Option<&str> {
        ["risk_level", "severity", "level"]
            .iter()
            .find_map(|key| risk.get(*key).and_then(Value::as_str))
    }
}

impl FinancialDocument for AgreementContract {
    const DOCUMENT_TYPE: DocumentType = DocumentType::AgreementContract;

    fn extraction_rules() -> &'static str {
        r#"- Name every party with its role (lessor, lessee, vendor, client, ...).
- Key terms cover payment, term, renewal, termination, penalties and jurisdiction.
- For each risk give a `risk_level` of Low, Medium or High.
- List statutory or regulatory requirements the contract imposes under `compliance_requirements`."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let risk_levels = category_totals(
            self.risks.iter().map(|risk| (Self::risk_level(risk), Some(1.0))),
            "Unrated",
        );

        DerivedMetrics::builder()
            .table("parties", &self.parties)
            .table(
                "counts",
                json!({
                    "key_terms": self.key_terms.len(),
                    "obligations": self.obligations.len(),
                    "risks": self.risks.len(),
                    "compliance_requirements": self.compliance_requirements.len(),
                }),
            )
            .chart("risk_levels", &risk_levels)
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_levels_are_counted() {
        let contract = AgreementContract::from_model_value(json!({
            "contract_type": "Lease",
            "parties": [{"name": "A", "role": "Lessor"}, {"name": "B", "role": "Lessee"}],
            "risks": [
                {"risk": "Early termination", "risk_level": "High"},
                {"risk": "Escalation", "risk_level": "High"},
                "Unclear jurisdiction"
            ]
        }))
        .unwrap();

        let metrics = contract.metrics();
        let levels = metrics.charts["risk_levels"].as_array().unwrap();
        assert_eq!(levels[0]["category"], json!("High"));
        assert_eq!(levels[0]["amount"], json!(2.0));
        assert_eq!(levels[1]["category"], json!("Unrated"));
        assert_eq!(metrics.tables["counts"]["risks"], json!(3));
    }
}
