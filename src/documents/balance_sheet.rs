use super::{lenient_anomalies, lenient_rows, lenient_section, BreakdownRow, FinancialDocument};
use crate::metrics::{present_amounts, CategoryAmount, DerivedMetrics};
use crate::normalize::{lenient_bool, lenient_number, lenient_string};
use crate::schema::{Anomaly, DocumentType};
use crate::utils::{difference, ratio, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheet {
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Balance sheet date or financial year")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prepared_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub assets: Assets,
    #[serde(default, deserialize_with = "lenient_section")]
    pub liabilities: Liabilities,
    #[serde(default, deserialize_with = "lenient_section")]
    pub equity: Equity,
    #[serde(default, deserialize_with = "lenient_section")]
    pub summary: BalanceSheetSummary,
    #[serde(default, deserialize_with = "lenient_anomalies")]
    #[schemars(skip)]
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Assets {
    #[serde(default, deserialize_with = "lenient_number")]
    pub current_assets: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fixed_assets: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub intangible_assets: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub investments: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub other_assets: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_assets: Option<f64>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub asset_breakdown: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Liabilities {
    #[serde(default, deserialize_with = "lenient_number")]
    pub current_liabilities: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub long_term_liabilities: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Borrowings, already included in current or long-term liabilities")]
    pub loans: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Trade payables, already included in current liabilities")]
    pub creditors: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub other_liabilities: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_liabilities: Option<f64>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub liability_breakdown: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Equity {
    #[serde(default, deserialize_with = "lenient_number")]
    pub share_capital: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reserves: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub retained_earnings: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_equity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheetSummary {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_liabilities_and_equity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(skip)]
    pub difference: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_balanced: Option<bool>,
}

impl Assets {
    pub fn component_sum(&self) -> Option<f64> {
        sum_present([
            self.current_assets,
            self.fixed_assets,
            self.intangible_assets,
            self.investments,
            self.other_assets,
        ])
    }
}

impl Liabilities {
    /// Sum of the top-level liability groups. Loans and creditors are
    /// detail lines of those groups and only count when no group is given.
    pub fn component_sum(&self) -> Option<f64> {
        sum_present([
            self.current_liabilities,
            self.long_term_liabilities,
            self.other_liabilities,
        ])
        .or_else(|| sum_present([self.loans, self.creditors]))
    }

    /// Interest-bearing and long-term obligations.
    pub fn debt(&self) -> Option<f64> {
        self.loans.or(self.long_term_liabilities)
    }
}

impl Equity {
    pub fn component_sum(&self) -> Option<f64> {
        sum_present([self.share_capital, self.reserves, self.retained_earnings])
    }
}

impl BalanceSheet {
    pub fn total_assets(&self) -> Option<f64> {
        self.assets.total_assets.or_else(|| self.assets.component_sum())
    }

    pub fn total_liabilities(&self) -> Option<f64> {
        self.liabilities
            .total_liabilities
            .or_else(|| self.liabilities.component_sum())
    }

    pub fn total_equity(&self) -> Option<f64> {
        self.equity.total_equity.or_else(|| self.equity.component_sum())
    }

    pub fn working_capital(&self) -> Option<f64> {
        difference(self.assets.current_assets, self.liabilities.current_liabilities)
    }

    pub fn asset_mix(&self) -> Vec<CategoryAmount> {
        let a = &self.assets;
        present_amounts(&[
            ("Current Assets", a.current_assets),
            ("Fixed Assets", a.fixed_assets),
            ("Intangible Assets", a.intangible_assets),
            ("Investments", a.investments),
            ("Other Assets", a.other_assets),
        ])
    }

    pub fn liability_mix(&self) -> Vec<CategoryAmount> {
        let l = &self.liabilities;
        present_amounts(&[
            ("Current Liabilities", l.current_liabilities),
            ("Long-term Liabilities", l.long_term_liabilities),
            ("Other Liabilities", l.other_liabilities),
        ])
    }
}

impl FinancialDocument for BalanceSheet {
    const DOCUMENT_TYPE: DocumentType = DocumentType::BalanceSheet;

    fn extraction_rules() -> &'static str {
        r#"- Copy each group total (current assets, fixed assets, current liabilities, ...) as printed.
- List the individual lines under each group in `asset_breakdown` / `liability_breakdown` with their group as `category`.
- Copy `total_assets`, `total_liabilities` and `total_equity` exactly; never adjust them to make the sheet balance.
- Set `summary.is_balanced` only from what the document states."#
    }

    fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics::builder()
            .chart("asset_composition", self.asset_mix())
            .chart(
                "debt_vs_equity",
                present_amounts(&[
                    ("Liabilities", self.total_liabilities()),
                    ("Equity", self.total_equity()),
                ]),
            )
            .table("liability_composition", self.liability_mix())
            .ratio(
                "current_ratio",
                ratio(self.assets.current_assets, self.liabilities.current_liabilities),
            )
            .ratio(
                "debt_to_equity",
                ratio(self.total_liabilities(), self.total_equity()),
            )
            .ratio("working_capital", self.working_capital())
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_totals_fall_back_to_components() {
        let sheet = BalanceSheet::from_model_value(json!({
            "assets": {"current_assets": "4,00,000", "fixed_assets": "6,00,000"},
            "liabilities": {"current_liabilities": "2,00,000", "loans": "3,00,000", "long_term_liabilities": "3,00,000"},
            "equity": {"share_capital": "5,00,000"}
        }))
        .unwrap();

        assert_eq!(sheet.total_assets(), Some(1_000_000.0));
        assert_eq!(sheet.total_liabilities(), Some(500_000.0));
        assert_eq!(sheet.total_equity(), Some(500_000.0));

        let metrics = sheet.metrics();
        assert_eq!(metrics.ratio("current_ratio"), Some(2.0));
        assert_eq!(metrics.ratio("debt_to_equity"), Some(1.0));
        assert_eq!(metrics.ratio("working_capital"), Some(200_000.0));
    }

    #[test]
    fn test_missing_current_liabilities_gives_no_current_ratio() {
        let sheet = BalanceSheet::from_model_value(json!({
            "assets": {"current_assets": 100}
        }))
        .unwrap();
        assert_eq!(sheet.metrics().ratio("current_ratio"), None);
        assert_eq!(sheet.working_capital(), None);
    }
}
