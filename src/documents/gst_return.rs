use super::FinancialDocument;
use crate::metrics::{present_amounts, DerivedMetrics};
use crate::normalize::{lenient_number, lenient_string};
use crate::schema::DocumentType;
use crate::utils::{difference, percentage, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// GSTR-1 / GSTR-3B return.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GstReturn {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "15-character GSTIN")]
    pub gstin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub legal_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub trade_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Return period, e.g. 2024-03 or March 2024")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub filing_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub filing_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_sales: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub taxable_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cgst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sgst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub igst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cess: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Total tax charged on outward supplies")]
    pub output_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub input_tax_credit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reverse_charge: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_tax_payable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub interest_payable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub late_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub penalty: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_payable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_date: Option<String>,
}

impl GstReturn {
    /// Output tax as stated, else the sum of its components.
    pub fn effective_output_tax(&self) -> Option<f64> {
        self.output_tax
            .or_else(|| sum_present([self.cgst, self.sgst, self.igst, self.cess]))
    }

    /// Liability after ITC set-off, as stated or derived.
    pub fn effective_net_payable(&self) -> Option<f64> {
        self.net_tax_payable.or_else(|| {
            difference(self.effective_output_tax(), self.input_tax_credit).map(|v| v.max(0.0))
        })
    }
}

impl FinancialDocument for GstReturn {
    const DOCUMENT_TYPE: DocumentType = DocumentType::GstReturn;

    fn extraction_rules() -> &'static str {
        r#"- Read the return summary tables (3.1 / 4 / 6.1 in GSTR-3B, the B2B/B2C totals in GSTR-1).
- `output_tax` is the tax on outward supplies; `input_tax_credit` is the eligible ITC claimed.
- Keep CGST, SGST, IGST and cess separate. Do not add them up into one field unless the document only shows a total.
- Interest, late fee and penalty are null unless printed."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let output_tax = self.effective_output_tax();
        let components = present_amounts(&[
            ("CGST", self.cgst),
            ("SGST", self.sgst),
            ("IGST", self.igst),
            ("Cess", self.cess),
        ]);

        DerivedMetrics::builder()
            .table(
                "sales",
                json!({
                    "total_sales": self.total_sales,
                    "taxable_value": self.taxable_value,
                    "output_tax": output_tax,
                    "net_tax_payable": self.effective_net_payable(),
                }),
            )
            .chart(
                "output_vs_input_tax",
                present_amounts(&[
                    ("Output Tax", output_tax),
                    ("Input Tax Credit", self.input_tax_credit),
                ]),
            )
            .chart("tax_components", &components)
            .ratio("itc_utilization", percentage(self.input_tax_credit, output_tax))
            .ratio(
                "tax_liability_rate",
                percentage(self.effective_net_payable(), self.taxable_value),
            )
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tax_falls_back_to_components() {
        let gst = GstReturn::from_model_value(json!({
            "gstin": "29ABCDE1234F1Z5",
            "taxable_value": "1,00,000",
            "cgst": "9,000",
            "sgst": "9,000",
            "input_tax_credit": 6000
        }))
        .unwrap();

        assert_eq!(gst.effective_output_tax(), Some(18000.0));
        assert_eq!(gst.effective_net_payable(), Some(12000.0));

        let metrics = gst.metrics();
        assert_eq!(metrics.ratio("itc_utilization"), Some(33.33));
        assert_eq!(metrics.ratio("tax_liability_rate"), Some(12.0));
        assert_eq!(metrics.charts["tax_components"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_values_stay_null() {
        let gst = GstReturn::from_model_value(json!({"gstin": "X", "igst": ""})).unwrap();
        assert_eq!(gst.igst, None);
        assert_eq!(gst.effective_output_tax(), None);
        assert_eq!(gst.metrics().ratio("itc_utilization"), None);
    }
}
