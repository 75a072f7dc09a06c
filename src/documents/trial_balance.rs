use super::{lenient_anomalies, lenient_rows, FinancialDocument};
use crate::metrics::{category_totals, DerivedMetrics};
use crate::normalize::{lenient_bool, lenient_number, lenient_string};
use crate::schema::{Anomaly, DocumentType};
use crate::utils::{percentage, ratio};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const TOP_ACCOUNTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum LedgerAccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl LedgerAccountType {
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let kind = match label.as_str() {
            "asset" | "assets" | "current asset" | "fixed asset" => LedgerAccountType::Asset,
            "liability" | "liabilities" | "current liability" => LedgerAccountType::Liability,
            "equity" | "capital" | "reserves" => LedgerAccountType::Equity,
            "income" | "revenue" | "sales" => LedgerAccountType::Income,
            "expense" | "expenses" | "cost" => LedgerAccountType::Expense,
            _ => return None,
        };
        Some(kind)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LedgerAccountType::Asset => "Asset",
            LedgerAccountType::Liability => "Liability",
            LedgerAccountType::Equity => "Equity",
            LedgerAccountType::Income => "Income",
            LedgerAccountType::Expense => "Expense",
        }
    }
}

fn lenient_account_type<'de, D>(deserializer: D) -> std::result::Result<Option<LedgerAccountType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(LedgerAccountType::from_label))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TrialBalance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prepared_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_debits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_credits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "total_debits - total_credits")]
    pub difference: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_balanced: Option<bool>,
    #[serde(default, deserialize_with = "lenient_rows")]
    #[schemars(description = "Every ledger account listed in the trial balance")]
    pub balances: Vec<TrialBalanceAccount>,
    #[serde(default, deserialize_with = "lenient_anomalies")]
    #[schemars(skip)]
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrialBalanceAccount {
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_account_type")]
    pub account_type: Option<LedgerAccountType>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub debit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub credit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub balance: Option<f64>,
}

impl TrialBalanceAccount {
    pub fn name(&self) -> &str {
        self.account_name.as_deref().unwrap_or("Unnamed account")
    }

    /// Debit-positive net balance of the account.
    pub fn net_debit(&self) -> f64 {
        match (self.debit, self.credit) {
            (None, None) => self.balance.unwrap_or(0.0),
            (debit, credit) => debit.unwrap_or(0.0) - credit.unwrap_or(0.0),
        }
    }

    /// Balance on the account's natural side: debit for assets and
    /// expenses, credit for everything else.
    pub fn natural_balance(&self) -> f64 {
        match self.account_type {
            Some(LedgerAccountType::Asset | LedgerAccountType::Expense) | None => self.net_debit(),
            Some(_) => -self.net_debit(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.debit
            .unwrap_or(0.0)
            .max(self.credit.unwrap_or(0.0))
            .max(self.balance.unwrap_or(0.0).abs())
    }
}

impl TrialBalance {
    pub fn accounts_of(&self, kind: LedgerAccountType) -> impl Iterator<Item = &TrialBalanceAccount> + '_ {
        self.balances
            .iter()
            .filter(move |a| a.account_type == Some(kind))
    }

    /// Sum of the natural balances of every account of `kind`.
    pub fn total_of(&self, kind: LedgerAccountType) -> f64 {
        self.accounts_of(kind).map(TrialBalanceAccount::natural_balance).sum()
    }

    pub fn computed_total_debits(&self) -> f64 {
        self.balances.iter().filter_map(|a| a.debit).sum()
    }

    pub fn computed_total_credits(&self) -> f64 {
        self.balances.iter().filter_map(|a| a.credit).sum()
    }
}

impl FinancialDocument for TrialBalance {
    const DOCUMENT_TYPE: DocumentType = DocumentType::TrialBalance;

    fn extraction_rules() -> &'static str {
        r#"- List every ledger account with its debit and credit columns exactly as printed.
- Classify each account as Asset, Liability, Equity, Income or Expense.
- Copy the printed column totals into `total_debits` and `total_credits`; do not force them to agree.
- Skip group headings that carry no amounts."#
    }

    fn metrics(&self) -> DerivedMetrics {
        let mut ranked: Vec<&TrialBalanceAccount> = self.balances.iter().collect();
        ranked.sort_by(|a, b| b.magnitude().total_cmp(&a.magnitude()));
        ranked.truncate(TOP_ACCOUNTS);

        let by_type = category_totals(
            self.balances.iter().map(|a| {
                (
                    a.account_type.as_ref().map(LedgerAccountType::label),
                    Some(a.natural_balance()),
                )
            }),
            "Unclassified",
        );

        let has_rows = !self.balances.is_empty();
        let debits = has_rows.then(|| self.computed_total_debits());
        let credits = has_rows.then(|| self.computed_total_credits());
        let largest = ranked.first().map(|a| a.magnitude());

        DerivedMetrics::builder()
            .table("top_accounts", &ranked)
            .chart("account_type_breakdown", &by_type)
            .ratio("debit_credit_ratio", ratio(debits, credits))
            .ratio("major_account_concentration", percentage(largest, debits))
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TrialBalance {
        TrialBalance::from_model_value(json!({
            "entity_name": "Acme Traders",
            "balances": [
                {"account_name": "Cash", "account_type": "asset", "debit": "50,000"},
                {"account_name": "Sales", "account_type": "Revenue", "credit": "80,000"},
                {"account_name": "Rent", "account_type": "Expenses", "debit": 30000},
                {"account_name": "Mystery", "account_type": "??", "debit": 0}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_account_types_are_normalized() {
        let tb = sample();
        assert_eq!(tb.balances[0].account_type, Some(LedgerAccountType::Asset));
        assert_eq!(tb.balances[1].account_type, Some(LedgerAccountType::Income));
        assert_eq!(tb.balances[2].account_type, Some(LedgerAccountType::Expense));
        assert_eq!(tb.balances[3].account_type, None);
        assert_eq!(tb.total_of(LedgerAccountType::Income), 80000.0);
    }

    #[test]
    fn test_metrics() {
        let metrics = sample().metrics();
        assert_eq!(metrics.ratio("debit_credit_ratio"), Some(1.0));
        assert_eq!(metrics.ratio("major_account_concentration"), Some(100.0));
        let top = metrics.tables["top_accounts"].as_array().unwrap();
        assert_eq!(top[0]["account_name"], json!("Sales"));
    }
}
