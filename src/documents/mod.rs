//! Typed schemas for every supported document, one module per type.
//!
//! Each schema doubles as the output contract sent to the model: the JSON
//! Schema generated from the Rust type is embedded in the extraction prompt,
//! and the model's reply is deserialized straight back into the same type.
//! All numeric leaves go through [`crate::normalize::clean_number`] on the
//! way in.

use crate::error::{FinancialDocumentError, Result};
use crate::metrics::DerivedMetrics;
use crate::normalize::lenient_list;
use crate::schema::{Anomaly, DocumentType};
use crate::utils::truncate_chars;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserializer, Serialize};
use serde_json::Value;

pub mod agreement_contract;
pub mod audit_papers;
pub mod balance_sheet;
pub mod bank_statement;
pub mod gst_return;
pub mod invoice;
pub mod profit_loss;
pub mod purchase_order;
pub mod salary_slip;
pub mod trial_balance;

pub use agreement_contract::{AgreementContract, ContractParty};
pub use audit_papers::AuditPapers;
pub use balance_sheet::{Assets, BalanceSheet, BalanceSheetSummary, Equity, Liabilities};
pub use bank_statement::{BankStatement, BankSummary, BankTransaction};
pub use gst_return::GstReturn;
pub use invoice::{Invoice, InvoiceAmounts, InvoiceLineItem, InvoicePayment, TradeParty};
pub use profit_loss::{Expenses, ProfitLoss, Profitability, Revenue};
pub use purchase_order::{PurchaseOrder, PurchaseOrderAmounts, PurchaseOrderItem, PurchaseOrderTerms};
pub use salary_slip::{Deductions, Earnings, Employee, Employer, SalaryPeriod, SalarySlip, YearToDate};
pub use trial_balance::{LedgerAccountType, TrialBalance, TrialBalanceAccount};

/// A labelled line in a breakdown table (revenue streams, expense heads,
/// asset classes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize, JsonSchema)]
pub struct BreakdownRow {
    #[serde(default, deserialize_with = "crate::normalize::lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "crate::normalize::lenient_string")]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "crate::normalize::lenient_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "crate::normalize::lenient_number")]
    #[schemars(description = "Share of the section total, if printed")]
    pub percentage: Option<f64>,
}

/// Shared behaviour of the ten document schemas.
pub trait FinancialDocument: Serialize + DeserializeOwned + JsonSchema + Sized {
    const DOCUMENT_TYPE: DocumentType;

    /// Type-specific extraction guidance appended to the generic prompt.
    fn extraction_rules() -> &'static str;

    /// Builds the document from a parsed model response.
    fn from_model_value(value: Value) -> Result<Self> {
        deserialize_model_value(Self::DOCUMENT_TYPE, value)
    }

    /// Dashboard view computed purely from the normalized fields.
    fn metrics(&self) -> DerivedMetrics;

    /// JSON Schema of the output contract.
    fn output_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or(Value::Null)
    }
}

/// Deserializes a model response, reporting schema mismatches as malformed
/// model output rather than as an internal serialization failure.
pub(crate) fn deserialize_model_value<T: DeserializeOwned>(
    document_type: DocumentType,
    value: Value,
) -> Result<T> {
    if !value.is_object() {
        return Err(FinancialDocumentError::MalformedModelOutput {
            reason: format!("expected a JSON object for {}", document_type),
            preview: truncate_chars(&value.to_string(), 300).to_string(),
        });
    }
    let preview = truncate_chars(&value.to_string(), 300).to_string();
    serde_json::from_value(value).map_err(|e| FinancialDocumentError::MalformedModelOutput {
        reason: format!("response does not match the {} schema: {}", document_type, e),
        preview,
    })
}

/// Serde adapter for anomaly lists. Accepts previously serialized
/// [`Anomaly`] values as well as the free-form strings and objects models
/// produce.
pub(crate) fn lenient_anomalies<'de, D>(deserializer: D) -> std::result::Result<Vec<Anomaly>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = lenient_list(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| {
            serde_json::from_value::<Anomaly>(item.clone())
                .ok()
                .or_else(|| Anomaly::from_model_value(&item))
        })
        .collect())
}

/// Serde adapter for lists of typed rows where the model may send `null`,
/// a single object, or rows of the wrong shape. Unusable rows are dropped.
pub(crate) fn lenient_rows<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = lenient_list(deserializer)?;
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Serde adapter for nested sections. Anything other than a well-formed
/// object (`null`, `"N/A"`, a bare number) yields the empty section.
pub(crate) fn lenient_section<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = <Value as serde::Deserialize>::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AnomalyOrigin;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "lenient_anomalies")]
        anomalies: Vec<Anomaly>,
    }

    #[test]
    fn test_lenient_anomalies_keeps_origin_of_serialized_values() {
        let holder: Holder = serde_json::from_value(json!({
            "anomalies": [
                "Duplicate cheque number",
                {"description": "Balance mismatch", "origin": "reconciliation", "severity": "warning"},
                null
            ]
        }))
        .unwrap();
        assert_eq!(holder.anomalies.len(), 2);
        assert_eq!(holder.anomalies[0].origin, AnomalyOrigin::Model);
        assert_eq!(holder.anomalies[1].origin, AnomalyOrigin::Reconciliation);
    }

    #[test]
    fn test_non_object_response_is_malformed() {
        let err = deserialize_model_value::<Value>(DocumentType::Invoice, json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), "malformed_model_output");
    }
}
