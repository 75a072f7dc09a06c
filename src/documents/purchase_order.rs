use super::{lenient_rows, lenient_section, FinancialDocument, TradeParty};
use crate::metrics::{category_totals, present_amounts, DerivedMetrics};
use crate::normalize::{lenient_number, lenient_string};
use crate::schema::DocumentType;
use crate::utils::{percentage, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PurchaseOrder {
    #[serde(default, deserialize_with = "lenient_string")]
    pub po_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "YYYY-MM-DD")]
    pub po_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub delivery_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub validity_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    #[schemars(description = "Supplier the order is placed with")]
    pub vendor: TradeParty,
    #[serde(default, deserialize_with = "lenient_section")]
    pub buyer: TradeParty,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub items: Vec<PurchaseOrderItem>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub amounts: PurchaseOrderAmounts,
    #[serde(default, deserialize_with = "lenient_section")]
    pub terms: PurchaseOrderTerms,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PurchaseOrderItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub specification: Option<String>,
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
    pub tax_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tax_amount: Option<f64>,
}

impl PurchaseOrderItem {
    pub fn line_value(&self) -> Option<f64> {
        self.amount.or_else(|| match (self.quantity, self.rate) {
            (Some(q), Some(r)) => Some(q * r - self.discount.unwrap_or(0.0)),
            _ => None,
        })
    }

    /// Short spend category derived from the item description.
    pub fn spend_category(&self) -> String {
        let description = self.description.as_deref().unwrap_or("Other").trim();
        description.chars().take(20).collect::<String>().trim_end().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PurchaseOrderAmounts {
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
    pub tax_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub shipping_charges: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PurchaseOrderTerms {
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_terms: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub delivery_terms: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub warranty: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
}

impl PurchaseOrder {
    pub fn items_total(&self) -> Option<f64> {
        sum_present(self.items.iter().map(PurchaseOrderItem::line_value))
    }

    pub fn tax_amount(&self) -> Option<f64> {
        let a = &self.amounts;
        a.tax_amount.or_else(|| sum_present([a.cgst, a.sgst, a.igst]))
    }

    pub fn total_amount(&self) -> Option<f64> {
        let a = &self.amounts;
        a.total_amount.or_else(|| {
            let base = a.taxable_amount.or(a.subtotal).or_else(|| self.items_total())?;
            Some(base + self.tax_amount().unwrap_or(0.0) + a.shipping_charges.unwrap_or(0.0))
        })
    }

    pub fn vendor_name(&self) -> &str {
        self.vendor.name.as_deref().unwrap_or("Unknown vendor")
    }
}

impl FinancialDocument for PurchaseOrder {
    const DOCUMENT_TYPE: DocumentType = DocumentType::PurchaseOrder;

    fn extraction_rules() -> &'static str {
        r#"- The vendor is the supplier receiving the order; the buyer places it.
- List every ordered item with quantity, unit, rate and amount.
- Copy payment, delivery and warranty terms verbatim where present."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let total = self.total_amount();
        let spend = category_totals(
            self.items
                .iter()
                .map(|item| (Some(self.vendor_name()), item.line_value())),
            "Unknown vendor",
        );
        let quantities = present_amounts(
            &self
                .items
                .iter()
                .map(|item| (item.description.as_deref().unwrap_or("Item"), item.quantity))
                .collect::<Vec<_>>(),
        );
        let spend_total: f64 = spend.iter().map(|s| s.amount).sum();
        let top_vendor = spend.iter().map(|s| s.amount).reduce(f64::max);
        let largest_item = self
            .items
            .iter()
            .filter_map(PurchaseOrderItem::line_value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        DerivedMetrics::builder()
            .table("vendor_spend", &spend)
            .chart("item_quantities", &quantities)
            .ratio(
                "vendor_concentration",
                percentage(top_vendor, (!spend.is_empty()).then_some(spend_total)),
            )
            .ratio("largest_item_share", percentage(largest_item, total))
            .ratio("tax_share", percentage(self.tax_amount(), total))
            .requires_multiple_documents(true)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_derived_from_items() {
        let po = PurchaseOrder::from_model_value(json!({
            "po_number": "PO-77",
            "vendor": {"name": "Steel Corp"},
            "items": [
                {"description": "MS Plates 10mm thickness grade A", "quantity": "4", "rate": "2,500"},
                {"description": "Bolts", "amount": 1000}
            ],
            "amounts": {"igst": "1,980", "shipping_charges": 20}
        }))
        .unwrap();

        assert_eq!(po.items_total(), Some(11000.0));
        assert_eq!(po.total_amount(), Some(13000.0));
        assert_eq!(po.items[0].spend_category(), "MS Plates 10mm thick");

        let metrics = po.metrics();
        assert_eq!(metrics.ratio("vendor_concentration"), Some(100.0));
        assert_eq!(metrics.ratio("tax_share"), Some(15.23));
        assert_eq!(metrics.tables["vendor_spend"][0]["category"], json!("Steel Corp"));
    }
}
