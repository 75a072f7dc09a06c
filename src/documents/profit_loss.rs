use super::{lenient_rows, lenient_section, BreakdownRow, FinancialDocument};
use crate::metrics::{category_totals, present_amounts, DerivedMetrics};
use crate::normalize::{lenient_number, lenient_string};
use crate::schema::DocumentType;
use crate::utils::{difference, percentage, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProfitLoss {
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prepared_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub revenue: Revenue,
    #[serde(default, deserialize_with = "lenient_section")]
    pub expenses: Expenses,
    #[serde(default, deserialize_with = "lenient_section")]
    pub profitability: Profitability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Revenue {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_revenue: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sales: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub service_income: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub other_income: Option<f64>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub revenue_breakdown: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Expenses {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_expenses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cost_of_goods_sold: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub operating_expenses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub administrative_expenses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Interest and bank charges")]
    pub financial_expenses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tax_expenses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub expense_breakdown: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Profitability {
    #[serde(default, deserialize_with = "lenient_number")]
    pub gross_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub operating_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub profit_before_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Percentage, only if printed")]
    pub gross_margin: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "Percentage, only if printed")]
    pub net_margin: Option<f64>,
}

impl ProfitLoss {
    pub fn total_revenue(&self) -> Option<f64> {
        let r = &self.revenue;
        r.total_revenue
            .or_else(|| sum_present([r.sales, r.service_income, r.other_income]))
    }

    /// Revenue from operations, excluding other income.
    pub fn operating_revenue(&self) -> Option<f64> {
        let r = &self.revenue;
        sum_present([r.sales, r.service_income])
            .or_else(|| difference(r.total_revenue, r.other_income))
            .or(r.total_revenue)
    }

    pub fn total_expenses(&self) -> Option<f64> {
        let e = &self.expenses;
        e.total_expenses.or_else(|| {
            sum_present([
                e.cost_of_goods_sold,
                e.operating_expenses,
                e.administrative_expenses,
                e.financial_expenses,
                e.tax_expenses,
            ])
        })
    }

    pub fn gross_profit(&self) -> Option<f64> {
        self.profitability.gross_profit.or_else(|| {
            difference(self.operating_revenue(), self.expenses.cost_of_goods_sold)
        })
    }

    pub fn operating_profit(&self) -> Option<f64> {
        self.profitability.operating_profit.or_else(|| {
            let e = &self.expenses;
            let overheads = sum_present([e.operating_expenses, e.administrative_expenses])?;
            difference(self.gross_profit(), Some(overheads))
        })
    }

    pub fn net_profit(&self) -> Option<f64> {
        self.profitability
            .net_profit
            .or_else(|| difference(self.total_revenue(), self.total_expenses()))
    }

    pub fn gross_margin(&self) -> Option<f64> {
        self.profitability
            .gross_margin
            .or_else(|| percentage(self.gross_profit(), self.total_revenue()))
    }

    pub fn net_margin(&self) -> Option<f64> {
        self.profitability
            .net_margin
            .or_else(|| percentage(self.net_profit(), self.total_revenue()))
    }

    /// Expense heads from the breakdown, or from the summary lines when the
    /// model did not return a breakdown.
    pub fn expense_heads(&self) -> Vec<crate::metrics::CategoryAmount> {
        let e = &self.expenses;
        if e.expense_breakdown.is_empty() {
            present_amounts(&[
                ("Cost of Goods Sold", e.cost_of_goods_sold),
                ("Operating Expenses", e.operating_expenses),
                ("Administrative Expenses", e.administrative_expenses),
                ("Financial Expenses", e.financial_expenses),
                ("Tax", e.tax_expenses),
            ])
        } else {
            category_totals(
                e.expense_breakdown
                    .iter()
                    .map(|row| (row.category.as_deref(), row.amount)),
                "Other",
            )
        }
    }
}

impl FinancialDocument for ProfitLoss {
    const DOCUMENT_TYPE: DocumentType = DocumentType::ProfitLoss;

    fn extraction_rules() -> &'static str {
        r#"- Separate revenue from operations (sales, services) from other income.
- Fill the expense summary lines and list each expense head in `expense_breakdown`.
- Copy profit lines and margins only when the statement prints them; leave them null otherwise.
- Losses are negative numbers."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let mut heads = self.expense_heads();
        heads.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        let top_five: Vec<_> = heads.iter().take(5).cloned().collect();

        DerivedMetrics::builder()
            .table("top_expenses", &top_five)
            .chart("expense_distribution", &heads)
            .chart(
                "revenue_vs_expenses",
                present_amounts(&[
                    ("Revenue", self.total_revenue()),
                    ("Expenses", self.total_expenses()),
                    ("Net Profit", self.net_profit()),
                ]),
            )
            .ratio("gross_margin", self.gross_margin())
            .ratio("net_margin", self.net_margin())
            .ratio(
                "expense_to_revenue",
                percentage(self.total_expenses(), self.total_revenue()),
            )
            .requires_multiple_documents(true)
            .build()
    }
}
