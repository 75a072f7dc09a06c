use super::{deserialize_model_value, lenient_anomalies, lenient_rows, lenient_section, FinancialDocument};
use crate::error::Result;
use crate::metrics::{category_totals, DerivedMetrics};
use crate::normalize::{lenient_list, lenient_number, lenient_string};
use crate::schema::{Anomaly, DocumentType};
use crate::utils::{month_bucket, percentage, ratio, round2, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Transactions above this amount are listed as high-value.
pub const HIGH_VALUE_THRESHOLD: f64 = 10_000.0;
const HIGH_VALUE_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BankStatement {
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_holder: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ifsc_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "YYYY-MM-DD")]
    pub statement_start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "YYYY-MM-DD")]
    pub statement_end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub opening_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub closing_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_deposits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_withdrawals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_balance_change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_monthly_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_rows")]
    #[schemars(description = "Every transaction row, in statement order")]
    pub transactions: Vec<BankTransaction>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub summary: BankSummary,
}

/// One statement row, normalized to separate debit and credit columns.
///
/// Deserialization also accepts the `{type: "credit"|"debit", amount}` row
/// shape that older prompts produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct BankTransaction {
    #[schemars(description = "YYYY-MM-DD")]
    pub date: Option<String>,
    pub description: Option<String>,
    #[schemars(description = "Money leaving the account, null when the row is a credit")]
    pub debit: Option<f64>,
    #[schemars(description = "Money entering the account, null when the row is a debit")]
    pub credit: Option<f64>,
    #[schemars(description = "Running balance printed on the row")]
    pub balance: Option<f64>,
    pub category: Option<String>,
    pub reference_number: Option<String>,
    #[schemars(description = "UPI, NEFT, IMPS, ATM, Cheque, Card, ...")]
    pub mode: Option<String>,
}

#[derive(Deserialize)]
struct RawBankTransaction {
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    direction: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    debit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    credit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    reference_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    mode: Option<String>,
}

impl From<RawBankTransaction> for BankTransaction {
    fn from(raw: RawBankTransaction) -> Self {
        let (mut debit, mut credit) = (raw.debit, raw.credit);

        if debit.is_none() && credit.is_none() {
            if let Some(amount) = raw.amount {
                let direction = raw.direction.as_deref().map(str::to_lowercase);
                match direction.as_deref() {
                    Some("credit" | "cr" | "deposit") => credit = Some(amount.abs()),
                    Some("debit" | "dr" | "withdrawal") => debit = Some(amount.abs()),
                    _ if amount < 0.0 => debit = Some(amount.abs()),
                    _ => {}
                }
            }
        }

        Self {
            date: raw.date,
            description: raw.description,
            debit,
            credit,
            balance: raw.balance,
            category: raw.category,
            reference_number: raw.reference_number,
            mode: raw.mode,
        }
    }
}

impl<'de> Deserialize<'de> for BankTransaction {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawBankTransaction::deserialize(deserializer).map(Self::from)
    }
}

impl BankTransaction {
    /// Signed effect on the balance: `credit - debit`.
    pub fn net_amount(&self) -> f64 {
        self.credit.unwrap_or(0.0) - self.debit.unwrap_or(0.0)
    }

    /// The larger of the two amount columns, for ranking.
    pub fn magnitude(&self) -> f64 {
        self.debit.unwrap_or(0.0).max(self.credit.unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BankSummary {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_transactions: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub opening_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub closing_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_debits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_credits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub largest_credit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub largest_debit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cash_withdrawals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub online_transfers: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recurring_payments: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_anomalies")]
    #[schemars(description = "Rows whose amounts were inferred from balance changes, or that look inconsistent")]
    pub anomalies: Vec<Anomaly>,
}

impl BankStatement {
    /// Sum of every debit column.
    pub fn computed_total_debits(&self) -> f64 {
        self.transactions.iter().filter_map(|t| t.debit).sum()
    }

    /// Sum of every credit column.
    pub fn computed_total_credits(&self) -> f64 {
        self.transactions.iter().filter_map(|t| t.credit).sum()
    }

    pub fn effective_opening_balance(&self) -> Option<f64> {
        self.opening_balance.or(self.summary.opening_balance)
    }

    pub fn effective_closing_balance(&self) -> Option<f64> {
        self.closing_balance
            .or(self.summary.closing_balance)
            .or_else(|| self.transactions.iter().rev().find_map(|t| t.balance))
    }

    /// Income and expense per `YYYY-MM`, skipping rows without a usable date.
    pub fn monthly_flows(&self) -> BTreeMap<String, (f64, f64)> {
        let mut months: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for txn in &self.transactions {
            let Some(month) = month_bucket(txn.date.as_deref()) else {
                continue;
            };
            let entry = months.entry(month).or_default();
            entry.0 += txn.credit.unwrap_or(0.0);
            entry.1 += txn.debit.unwrap_or(0.0);
        }
        months
    }
}

impl FinancialDocument for BankStatement {
    const DOCUMENT_TYPE: DocumentType = DocumentType::BankStatement;

    fn extraction_rules() -> &'static str {
        r#"- List EVERY transaction row in order. Put the amount in `debit` for withdrawals and in `credit` for deposits; leave the other column null.
- If a row's amount is unreadable but the balances before and after it are visible, infer the amount from the balance change AND add an entry to `summary.anomalies` saying the amount was inferred.
- OCR noise such as ■, ●, • or | next to amounts is never a digit: drop it.
- Copy the running balance printed on each row into `balance`; do not recompute it.
- Categorize each transaction (Salary, Rent, Utilities, Food, Transfer, Cash Withdrawal, ...).
- Record anything inconsistent (balance jumps, duplicate references) in `summary.anomalies`."#
    }

    fn from_model_value(value: Value) -> Result<Self> {
        // Older responses were a bare array of transactions.
        let value = match value {
            Value::Array(rows) => json!({ "transactions": rows }),
            other => other,
        };
        let mut statement: BankStatement = deserialize_model_value(Self::DOCUMENT_TYPE, value)?;
        if statement.opening_balance.is_none() {
            statement.opening_balance = statement.summary.opening_balance;
        }
        if statement.closing_balance.is_none() {
            statement.closing_balance = statement.summary.closing_balance;
        }
        Ok(statement)
    }

    fn metrics(&self) -> DerivedMetrics {
        let credits = self.computed_total_credits();
        let debits = self.computed_total_debits();

        let category_spend = category_totals(
            self.transactions
                .iter()
                .filter(|t| t.debit.is_some())
                .map(|t| (t.category.as_deref(), t.debit)),
            "Uncategorized",
        );

        let mut high_value: Vec<&BankTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.magnitude() > HIGH_VALUE_THRESHOLD)
            .collect();
        high_value.sort_by(|a, b| b.magnitude().total_cmp(&a.magnitude()));
        high_value.truncate(HIGH_VALUE_LIMIT);

        let monthly = self.monthly_flows();
        let trend: Vec<Value> = monthly
            .iter()
            .map(|(month, (income, expense))| {
                json!({
                    "month": month,
                    "income": round2(*income),
                    "expense": round2(*expense),
                    "net": round2(income - expense),
                })
            })
            .collect();

        let balance_line: Vec<Value> = self
            .transactions
            .iter()
            .filter_map(|t| {
                t.balance
                    .map(|balance| json!({ "date": t.date, "balance": balance }))
            })
            .collect();

        let has_rows = !self.transactions.is_empty();
        let total_credits = has_rows.then_some(credits);
        let total_debits = has_rows.then_some(debits);
        let average_monthly_savings = if monthly.is_empty() {
            None
        } else {
            Some(round2((credits - debits) / monthly.len() as f64))
        };

        DerivedMetrics::builder()
            .table("category_spend", &category_spend)
            .table("high_value_transactions", &high_value)
            .chart("monthly_trend", &trend)
            .chart("balance_over_time", &balance_line)
            .chart("spend_by_category", &category_spend)
            .ratio(
                "savings_rate",
                percentage(sum_present([total_credits, total_debits.map(|d| -d)]), total_credits),
            )
            .ratio("expense_ratio", percentage(total_debits, total_credits))
            .ratio("deposit_withdrawal_ratio", ratio(total_credits, total_debits))
            .ratio("average_monthly_savings", average_monthly_savings)
            .requires_multiple_documents(false)
            .build()
    }
}
