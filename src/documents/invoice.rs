use super::{lenient_rows, lenient_section, FinancialDocument};
use crate::metrics::{present_amounts, DerivedMetrics};
use crate::normalize::{lenient_number, lenient_string};
use crate::schema::DocumentType;
use crate::utils::{difference, parse_iso_date, percentage, round2, sum_present};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "YYYY-MM-DD")]
    pub invoice_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "YYYY-MM-DD")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub seller: TradeParty,
    #[serde(default, deserialize_with = "lenient_section")]
    pub buyer: TradeParty,
    #[serde(default, deserialize_with = "lenient_section")]
    pub amounts: InvoiceAmounts,
    #[serde(default, deserialize_with = "lenient_section")]
    pub payment: InvoicePayment,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub line_items: Vec<InvoiceLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TradeParty {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gstin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pan: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bank_details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceAmounts {
    #[serde(default, deserialize_with = "lenient_number")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub discount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub taxable_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cgst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sgst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub igst: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cess: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tax_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub round_off: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InvoicePayment {
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_terms: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Paid, Unpaid or Partially Paid")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub paid_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub outstanding_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceLineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hsn_sac: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub discount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Percentage, e.g. 18")]
    pub tax_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tax_amount: Option<f64>,
}

impl InvoiceLineItem {
    /// Stated amount, else quantity x rate less discount.
    pub fn line_value(&self) -> Option<f64> {
        self.amount.or_else(|| match (self.quantity, self.rate) {
            (Some(q), Some(r)) => Some(q * r - self.discount.unwrap_or(0.0)),
            _ => None,
        })
    }
}

impl Invoice {
    pub fn tax_amount(&self) -> Option<f64> {
        let a = &self.amounts;
        a.tax_amount
            .or_else(|| sum_present([a.cgst, a.sgst, a.igst, a.cess]))
    }

    pub fn taxable_amount(&self) -> Option<f64> {
        let a = &self.amounts;
        a.taxable_amount
            .or_else(|| a.subtotal.map(|s| s - a.discount.unwrap_or(0.0)))
    }

    pub fn total_amount(&self) -> Option<f64> {
        self.amounts.total_amount.or_else(|| {
            let taxable = self.taxable_amount()?;
            Some(taxable + self.tax_amount().unwrap_or(0.0) + self.amounts.round_off.unwrap_or(0.0))
        })
    }

    /// Outstanding as stated, else total less amount paid. A document
    /// marked paid with no amounts has nothing outstanding.
    pub fn outstanding_amount(&self) -> Option<f64> {
        let p = &self.payment;
        if let Some(outstanding) = p.outstanding_amount {
            return Some(outstanding);
        }
        if self.is_paid() {
            return Some(0.0);
        }
        difference(self.total_amount(), Some(p.paid_amount.unwrap_or(0.0)))
    }

    pub fn is_paid(&self) -> bool {
        self.payment
            .payment_status
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("paid"))
            .unwrap_or(false)
    }

    pub fn parsed_invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date.as_deref().and_then(parse_iso_date)
    }

    pub fn parsed_due_date(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_iso_date)
    }

    pub fn tax_components(&self) -> Vec<crate::metrics::CategoryAmount> {
        let a = &self.amounts;
        present_amounts(&[
            ("CGST", a.cgst),
            ("SGST", a.sgst),
            ("IGST", a.igst),
            ("Cess", a.cess),
        ])
    }
}

impl FinancialDocument for Invoice {
    const DOCUMENT_TYPE: DocumentType = DocumentType::Invoice;

    fn extraction_rules() -> &'static str {
        r#"- The seller is the party issuing the invoice; the buyer is billed.
- List every line item with quantity, rate and amount as printed.
- Keep CGST, SGST and IGST separate; `tax_amount` is the total tax.
- `outstanding_amount` is null unless the invoice states an amount due or paid."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let values: Vec<f64> = self
            .line_items
            .iter()
            .filter_map(InvoiceLineItem::line_value)
            .collect();
        let average_line_value = if values.is_empty() {
            None
        } else {
            Some(round2(values.iter().sum::<f64>() / values.len() as f64))
        };

        DerivedMetrics::builder()
            .table(
                "parties",
                json!({
                    "seller": &self.seller,
                    "buyer": &self.buyer,
                }),
            )
            .table(
                "amount_summary",
                json!({
                    "taxable_amount": self.taxable_amount(),
                    "tax_amount": self.tax_amount(),
                    "total_amount": self.total_amount(),
                    "outstanding_amount": self.outstanding_amount(),
                }),
            )
            .chart("tax_breakdown", self.tax_components())
            .ratio("average_line_value", average_line_value)
            .ratio(
                "effective_tax_rate",
                percentage(self.tax_amount(), self.taxable_amount()),
            )
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Invoice {
        Invoice::from_model_value(json!({
            "invoice_number": "INV-001",
            "invoice_date": "2024-03-01",
            "due_date": "2024-03-31",
            "seller": {"name": "Acme Supplies", "gstin": "29AAAAA0000A1Z5"},
            "buyer": {"name": "Globex"},
            "amounts": {"subtotal": "₹10,000", "cgst": "900", "sgst": "900"},
            "payment": {"paid_amount": "5,000"},
            "line_items": [
                {"description": "Widgets", "quantity": 10, "rate": "500"},
                {"description": "Gadgets", "amount": "5,000"},
                "free text row"
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_derived_amounts() {
        let invoice = sample();
        assert_eq!(invoice.line_items.len(), 2);
        assert_eq!(invoice.tax_amount(), Some(1800.0));
        assert_eq!(invoice.taxable_amount(), Some(10000.0));
        assert_eq!(invoice.total_amount(), Some(11800.0));
        assert_eq!(invoice.outstanding_amount(), Some(6800.0));
        assert_eq!(invoice.parsed_due_date(), NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn test_metrics() {
        let metrics = sample().metrics();
        assert_eq!(metrics.ratio("effective_tax_rate"), Some(18.0));
        assert_eq!(metrics.ratio("average_line_value"), Some(5000.0));
        assert_eq!(metrics.tables["parties"]["buyer"]["name"], json!("Globex"));
    }

    #[test]
    fn test_paid_invoice_has_nothing_outstanding() {
        let invoice = Invoice::from_model_value(json!({
            "amounts": {"total_amount": 100},
            "payment": {"payment_status": "Paid"}
        }))
        .unwrap();
        assert_eq!(invoice.outstanding_amount(), Some(0.0));
    }
}
