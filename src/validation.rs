//! Arithmetic consistency checks for extracted documents.
//!
//! Nothing here fails an extraction: every inconsistency becomes an
//! [`Anomaly`] attached to the result, next to totals recomputed from the
//! line items.

use crate::documents::{BalanceSheet, BankStatement, TrialBalance};
use crate::schema::{Anomaly, Severity, StructuredDocument};
use crate::utils::round2;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum difference, in currency units, still treated as rounding.
pub const BALANCE_TOLERANCE: f64 = 1.0;

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub anomalies: Vec<Anomaly>,
    pub corrected_summary: CorrectedSummary,
}

/// Totals recomputed from the document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectedSummary {
    BankStatement(BankTotals),
    TrialBalance(EquationCheck),
    BalanceSheet(EquationCheck),
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTotals {
    pub transaction_count: usize,
    pub total_debits: f64,
    pub total_credits: f64,
    pub opening_balance: Option<f64>,
    /// Balance after the last row, carried forward through rows without a
    /// printed balance.
    pub running_closing_balance: Option<f64>,
}

/// `left == right` check for debits/credits or assets/(liabilities+equity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationCheck {
    pub left: Option<f64>,
    pub right: Option<f64>,
    /// Signed `left - right`.
    pub difference: Option<f64>,
    pub is_balanced: Option<bool>,
}

impl EquationCheck {
    pub fn new(left: Option<f64>, right: Option<f64>, tolerance: f64) -> Self {
        let raw = match (left, right) {
            (Some(l), Some(r)) => Some(l - r),
            _ => None,
        };
        Self {
            left,
            right,
            difference: raw.map(round2),
            is_balanced: raw.map(|d| d.abs() <= tolerance),
        }
    }
}

pub struct Reconciler {
    tolerance: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(BALANCE_TOLERANCE)
    }
}

impl Reconciler {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn validate(&self, document: &StructuredDocument) -> ValidationReport {
        match document {
            StructuredDocument::BankStatement(statement) => self.reconcile_bank_statement(statement),
            StructuredDocument::TrialBalance(tb) => self.check_trial_balance(tb),
            StructuredDocument::BalanceSheet(sheet) => self.check_balance_sheet(sheet),
            _ => ValidationReport {
                anomalies: Vec::new(),
                corrected_summary: CorrectedSummary::NotApplicable,
            },
        }
    }

    /// Walks the transactions in order, comparing each printed balance with
    /// `previous + credit - debit`.
    pub fn reconcile_bank_statement(&self, statement: &BankStatement) -> ValidationReport {
        let mut local = Vec::new();
        let opening = statement.effective_opening_balance();
        let mut previous = opening;

        for txn in &statement.transactions {
            let date = txn.date.as_deref().unwrap_or("unknown date");
            previous = match (previous, txn.balance) {
                (Some(prev), Some(actual)) => {
                    let expected = prev + txn.net_amount();
                    if (expected - actual).abs() > self.tolerance {
                        local.push(
                            Anomaly::reconciliation(format!(
                                "Balance mismatch at {}: expected {:.2}, got {:.2}",
                                date, expected, actual
                            ))
                            .with_date(txn.date.as_deref()),
                        );
                    }
                    // Re-base on the printed balance so one bad row yields one anomaly.
                    Some(actual)
                }
                (Some(prev), None) => Some(prev + txn.net_amount()),
                (None, actual) => actual,
            };
        }

        if let (Some(stated), Some(running)) = (statement.closing_balance, previous) {
            if (stated - running).abs() > self.tolerance {
                local.push(Anomaly::reconciliation(format!(
                    "Closing balance {:.2} does not match running balance {:.2}",
                    stated, running
                )));
            }
        }

        let total_debits = statement.computed_total_debits();
        let total_credits = statement.computed_total_credits();
        let has_rows = !statement.transactions.is_empty();
        if has_rows {
            let summary = &statement.summary;
            for (label, stated, computed) in [
                ("debits", summary.total_debits.or(statement.total_withdrawals), total_debits),
                ("credits", summary.total_credits.or(statement.total_deposits), total_credits),
            ] {
                if let Some(stated) = stated {
                    if (stated - computed).abs() > self.tolerance {
                        local.push(Anomaly::reconciliation(format!(
                            "Stated total {} {:.2} differ from the transaction sum {:.2}",
                            label, stated, computed
                        )));
                    }
                }
            }
        }

        debug!(
            "Reconciled {} bank transactions: {} local anomalies",
            statement.transactions.len(),
            local.len()
        );

        ValidationReport {
            anomalies: merge_anomalies(&statement.summary.anomalies, local),
            corrected_summary: CorrectedSummary::BankStatement(BankTotals {
                transaction_count: statement.transactions.len(),
                total_debits: round2(total_debits),
                total_credits: round2(total_credits),
                opening_balance: opening,
                running_closing_balance: previous,
            }),
        }
    }

    /// Debits must equal credits.
    pub fn check_trial_balance(&self, tb: &TrialBalance) -> ValidationReport {
        let mut local = Vec::new();
        let has_rows = !tb.balances.is_empty();
        let debits = if has_rows { Some(tb.computed_total_debits()) } else { tb.total_debits };
        let credits = if has_rows { Some(tb.computed_total_credits()) } else { tb.total_credits };

        if has_rows {
            for (label, stated, computed) in [
                ("debits", tb.total_debits, debits),
                ("credits", tb.total_credits, credits),
            ] {
                if let (Some(stated), Some(computed)) = (stated, computed) {
                    if (stated - computed).abs() > self.tolerance {
                        local.push(Anomaly::reconciliation(format!(
                            "Stated total {} {:.2} differ from the account sum {:.2}",
                            label, stated, computed
                        )));
                    }
                }
            }
        }

        let check = EquationCheck::new(debits, credits, self.tolerance);
        if check.is_balanced == Some(false) {
            local.push(
                Anomaly::reconciliation(format!(
                    "Trial balance does not tally: debits {:.2}, credits {:.2}, difference {:.2}",
                    debits.unwrap_or_default(),
                    credits.unwrap_or_default(),
                    check.difference.unwrap_or_default()
                ))
                .with_severity(Severity::Critical),
            );
        }

        ValidationReport {
            anomalies: merge_anomalies(&tb.anomalies, local),
            corrected_summary: CorrectedSummary::TrialBalance(check),
        }
    }

    /// Assets must equal liabilities plus equity, and each stated section
    /// total must equal the sum of its components.
    pub fn check_balance_sheet(&self, sheet: &BalanceSheet) -> ValidationReport {
        let mut local = Vec::new();

        for (label, stated, components) in [
            ("assets", sheet.assets.total_assets, sheet.assets.component_sum()),
            (
                "liabilities",
                sheet.liabilities.total_liabilities,
                sheet.liabilities.component_sum(),
            ),
            ("equity", sheet.equity.total_equity, sheet.equity.component_sum()),
        ] {
            if let (Some(stated), Some(sum)) = (stated, components) {
                if (stated - sum).abs() > self.tolerance {
                    local.push(Anomaly::reconciliation(format!(
                        "Total {} {:.2} differ from the sum of components {:.2}",
                        label, stated, sum
                    )));
                }
            }
        }

        let right = match (sheet.total_liabilities(), sheet.total_equity()) {
            (Some(l), Some(e)) => Some(l + e),
            _ => sheet.summary.total_liabilities_and_equity,
        };
        let check = EquationCheck::new(sheet.total_assets(), right, self.tolerance);
        if check.is_balanced == Some(false) {
            local.push(
                Anomaly::reconciliation(format!(
                    "Balance sheet does not balance: assets {:.2}, liabilities + equity {:.2}, difference {:.2}",
                    check.left.unwrap_or_default(),
                    check.right.unwrap_or_default(),
                    check.difference.unwrap_or_default()
                ))
                .with_severity(Severity::Critical),
            );
        }

        ValidationReport {
            anomalies: merge_anomalies(&sheet.anomalies, local),
            corrected_summary: CorrectedSummary::BalanceSheet(check),
        }
    }
}

impl ValidationReport {
    /// Writes the merged anomalies and recomputed totals back into the
    /// document's summary fields. Line items are left untouched.
    pub fn apply_to(&self, document: &mut StructuredDocument) {
        match (document, &self.corrected_summary) {
            (StructuredDocument::BankStatement(statement), CorrectedSummary::BankStatement(totals)) => {
                let summary = &mut statement.summary;
                summary.anomalies = self.anomalies.clone();
                summary.total_debits = Some(totals.total_debits);
                summary.total_credits = Some(totals.total_credits);
                summary.total_transactions = Some(totals.transaction_count as f64);
                if summary.opening_balance.is_none() {
                    summary.opening_balance = totals.opening_balance;
                }
                if summary.closing_balance.is_none() {
                    summary.closing_balance = totals.running_closing_balance;
                }
            }
            (StructuredDocument::TrialBalance(tb), CorrectedSummary::TrialBalance(check)) => {
                tb.anomalies = self.anomalies.clone();
                tb.total_debits = check.left;
                tb.total_credits = check.right;
                tb.difference = check.difference;
                tb.is_balanced = check.is_balanced;
            }
            (StructuredDocument::BalanceSheet(sheet), CorrectedSummary::BalanceSheet(check)) => {
                sheet.anomalies = self.anomalies.clone();
                if check.difference.is_some() {
                    sheet.summary.difference = check.difference;
                    sheet.summary.is_balanced = check.is_balanced;
                }
                if sheet.summary.total_liabilities_and_equity.is_none() {
                    sheet.summary.total_liabilities_and_equity = check.right;
                }
            }
            _ => {}
        }
    }
}

/// Validates with the default tolerance.
pub fn validate(document: &StructuredDocument) -> ValidationReport {
    Reconciler::default().validate(document)
}

/// Model-reported anomalies first, then local findings, dropping entries
/// whose normalized description and date were already seen.
pub fn merge_anomalies(existing: &[Anomaly], local: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .cloned()
        .chain(local)
        .filter(|anomaly| seen.insert(anomaly.dedup_key()))
        .collect()
}
