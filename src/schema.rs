use crate::documents::{
    AgreementContract, AuditPapers, BalanceSheet, BankStatement, FinancialDocument, GstReturn,
    Invoice, ProfitLoss, PurchaseOrder, SalarySlip, TrialBalance,
};
use crate::error::{FinancialDocumentError, Result};
use crate::metrics::DerivedMetrics;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BankStatement,
    GstReturn,
    TrialBalance,
    ProfitLoss,
    Invoice,
    PurchaseOrder,
    SalarySlip,
    BalanceSheet,
    AuditPapers,
    AgreementContract,
}

impl DocumentType {
    pub const ALL: [DocumentType; 10] = [
        DocumentType::BankStatement,
        DocumentType::GstReturn,
        DocumentType::TrialBalance,
        DocumentType::ProfitLoss,
        DocumentType::Invoice,
        DocumentType::PurchaseOrder,
        DocumentType::SalarySlip,
        DocumentType::BalanceSheet,
        DocumentType::AuditPapers,
        DocumentType::AgreementContract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BankStatement => "bank_statement",
            DocumentType::GstReturn => "gst_return",
            DocumentType::TrialBalance => "trial_balance",
            DocumentType::ProfitLoss => "profit_loss",
            DocumentType::Invoice => "invoice",
            DocumentType::PurchaseOrder => "purchase_order",
            DocumentType::SalarySlip => "salary_slip",
            DocumentType::BalanceSheet => "balance_sheet",
            DocumentType::AuditPapers => "audit_papers",
            DocumentType::AgreementContract => "agreement_contract",
        }
    }

    /// Human label, as used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::BankStatement => "Bank Statement",
            DocumentType::GstReturn => "GST Return (GSTR-1/GSTR-3B)",
            DocumentType::TrialBalance => "Trial Balance",
            DocumentType::ProfitLoss => "Profit & Loss Statement",
            DocumentType::Invoice => "Invoice",
            DocumentType::PurchaseOrder => "Purchase Order",
            DocumentType::SalarySlip => "Salary Slip/Payslip",
            DocumentType::BalanceSheet => "Balance Sheet",
            DocumentType::AuditPapers => "Audit Papers",
            DocumentType::AgreementContract => "Agreement/Contract",
        }
    }

    /// Maps a declared type or a classifier label onto a document type.
    ///
    /// Accepts the canonical snake_case names, free-form labels such as
    /// `"Profit & Loss Statement"` or `"Salary Slip (Payroll Report)"`, and
    /// the short aliases callers commonly send (`po`, `payslip`, `p&l`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let without_note = label.split('(').next().unwrap_or_default();
        let normalized = without_note
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");

        let kind = match normalized.as_str() {
            "bank_statement" | "bank" => DocumentType::BankStatement,
            "gst_return" | "gst_document" | "gst" | "gstr" => DocumentType::GstReturn,
            "trial_balance" => DocumentType::TrialBalance,
            "profit_loss" | "p&l" | "profit_&_loss" | "profit_&_loss_statement"
            | "profit_and_loss" | "profit_loss_statement" => DocumentType::ProfitLoss,
            "invoice" => DocumentType::Invoice,
            "purchase_order" | "po" => DocumentType::PurchaseOrder,
            "salary_slip" | "payslip" | "pay_slip" => DocumentType::SalarySlip,
            "balance_sheet" => DocumentType::BalanceSheet,
            "audit_papers" | "audit" | "audit_paper" => DocumentType::AuditPapers,
            "agreement_contract" | "agreement" | "contract" | "contract/agreement"
            | "agreement/contract" => DocumentType::AgreementContract,
            _ => return None,
        };
        Some(kind)
    }

    /// The fixed report menu produced for this document type.
    pub fn report_names(&self) -> [&'static str; 5] {
        match self {
            DocumentType::BankStatement => [
                "cash_flow_statement",
                "ledger_entries",
                "payment_receipt_summary",
                "anomaly_report",
                "bank_reconciliation",
            ],
            DocumentType::GstReturn => [
                "gst_reconciliation",
                "itc_utilization",
                "output_input_tax_summary",
                "gst_liability_statement",
                "gstr_invoice_match",
            ],
            DocumentType::TrialBalance => [
                "profit_loss",
                "balance_sheet",
                "cash_flow",
                "accounting_ratios",
                "management_report",
            ],
            DocumentType::ProfitLoss => [
                "profitability_summary",
                "revenue_vs_expense_analysis",
                "margin_kpis",
                "operating_vs_non_operating_split",
                "period_wise_profit_trend",
            ],
            DocumentType::Invoice => [
                "sales_ledger",
                "customer_outstanding_summary",
                "gst_breakdown",
                "invoice_aging",
                "payment_due_summary",
            ],
            DocumentType::PurchaseOrder => [
                "vendor_ledger",
                "purchase_summary",
                "category_spend_report",
                "po_vs_invoice_matching",
                "payables_summary",
            ],
            DocumentType::SalarySlip => [
                "salary_summary",
                "allowances_deductions_report",
                "pf_esi_tds_summary",
                "employee_cost_report",
                "payroll_journal_entries",
            ],
            DocumentType::BalanceSheet => [
                "asset_liability_schedules",
                "net_worth_statement",
                "solvency_liquidity_summary",
                "equity_movement_statement",
                "financial_position_report",
            ],
            DocumentType::AuditPapers => [
                "audit_ready_summary",
                "supporting_schedules",
                "adjustment_notes",
                "working_papers",
                "final_audit_pack",
            ],
            DocumentType::AgreementContract => [
                "contract_summary",
                "key_clause_extraction",
                "risk_obligation_analysis",
                "term_compliance_summary",
                "contract_analysis",
            ],
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = FinancialDocumentError;

    fn from_str(s: &str) -> Result<Self> {
        DocumentType::from_label(s)
            .ok_or_else(|| FinancialDocumentError::UnsupportedDocumentType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" | "info" | "informational" => Some(Severity::Info),
            "medium" | "warning" | "moderate" => Some(Severity::Warning),
            "high" | "critical" | "severe" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Who raised an anomaly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyOrigin {
    /// Reported by the model in its own analysis of the document.
    #[default]
    Model,
    /// Found by local arithmetic checks.
    Reconciliation,
}

/// A non-fatal arithmetic or consistency finding attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Anomaly {
    #[schemars(description = "What looks wrong, in one sentence")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Transaction date the anomaly refers to (YYYY-MM-DD), if any")]
    pub date: Option<String>,
    #[serde(default)]
    pub origin: AnomalyOrigin,
}

impl Anomaly {
    pub fn reconciliation(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: Some(Severity::Warning),
            date: None,
            origin: AnomalyOrigin::Reconciliation,
        }
    }

    pub fn with_date(mut self, date: Option<&str>) -> Self {
        self.date = date.map(str::to_string);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Interprets an anomaly entry from a model response. Models return
    /// either bare strings or objects with `description`/`reason` fields.
    pub fn from_model_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self {
                description: s.trim().to_string(),
                severity: None,
                date: None,
                origin: AnomalyOrigin::Model,
            }),
            Value::Object(map) => {
                let text = |key: &str| {
                    map.get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                };
                let description = text("description")
                    .or_else(|| text("reason"))
                    .or_else(|| text("issue"))
                    .or_else(|| text("type"))
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Some(Self {
                    description,
                    severity: text("severity")
                        .or_else(|| text("risk_level"))
                        .and_then(Severity::from_label),
                    date: text("date").map(str::to_string),
                    origin: AnomalyOrigin::Model,
                })
            }
            _ => None,
        }
    }

    /// Identity used when merging anomalies from different sources.
    pub fn dedup_key(&self) -> (String, String) {
        let description = self
            .description
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let date = self.date.clone().unwrap_or_default().trim().to_string();
        (description, date)
    }
}

/// A normalized extraction, one variant per supported document type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "document_type", content = "data", rename_all = "snake_case")]
pub enum StructuredDocument {
    BankStatement(BankStatement),
    GstReturn(GstReturn),
    TrialBalance(TrialBalance),
    ProfitLoss(ProfitLoss),
    Invoice(Invoice),
    PurchaseOrder(PurchaseOrder),
    SalarySlip(SalarySlip),
    BalanceSheet(BalanceSheet),
    AuditPapers(AuditPapers),
    AgreementContract(AgreementContract),
}

impl StructuredDocument {
    pub fn document_type(&self) -> DocumentType {
        match self {
            StructuredDocument::BankStatement(_) => DocumentType::BankStatement,
            StructuredDocument::GstReturn(_) => DocumentType::GstReturn,
            StructuredDocument::TrialBalance(_) => DocumentType::TrialBalance,
            StructuredDocument::ProfitLoss(_) => DocumentType::ProfitLoss,
            StructuredDocument::Invoice(_) => DocumentType::Invoice,
            StructuredDocument::PurchaseOrder(_) => DocumentType::PurchaseOrder,
            StructuredDocument::SalarySlip(_) => DocumentType::SalarySlip,
            StructuredDocument::BalanceSheet(_) => DocumentType::BalanceSheet,
            StructuredDocument::AuditPapers(_) => DocumentType::AuditPapers,
            StructuredDocument::AgreementContract(_) => DocumentType::AgreementContract,
        }
    }

    /// Deserializes (and thereby normalizes) a parsed model response.
    pub fn from_model_value(document_type: DocumentType, value: Value) -> Result<Self> {
        Ok(match document_type {
            DocumentType::BankStatement => {
                StructuredDocument::BankStatement(BankStatement::from_model_value(value)?)
            }
            DocumentType::GstReturn => {
                StructuredDocument::GstReturn(GstReturn::from_model_value(value)?)
            }
            DocumentType::TrialBalance => {
                StructuredDocument::TrialBalance(TrialBalance::from_model_value(value)?)
            }
            DocumentType::ProfitLoss => {
                StructuredDocument::ProfitLoss(ProfitLoss::from_model_value(value)?)
            }
            DocumentType::Invoice => StructuredDocument::Invoice(Invoice::from_model_value(value)?),
            DocumentType::PurchaseOrder => {
                StructuredDocument::PurchaseOrder(PurchaseOrder::from_model_value(value)?)
            }
            DocumentType::SalarySlip => {
                StructuredDocument::SalarySlip(SalarySlip::from_model_value(value)?)
            }
            DocumentType::BalanceSheet => {
                StructuredDocument::BalanceSheet(BalanceSheet::from_model_value(value)?)
            }
            DocumentType::AuditPapers => {
                StructuredDocument::AuditPapers(AuditPapers::from_model_value(value)?)
            }
            DocumentType::AgreementContract => {
                StructuredDocument::AgreementContract(AgreementContract::from_model_value(value)?)
            }
        })
    }

    pub fn metrics(&self) -> DerivedMetrics {
        match self {
            StructuredDocument::BankStatement(doc) => doc.metrics(),
            StructuredDocument::GstReturn(doc) => doc.metrics(),
            StructuredDocument::TrialBalance(doc) => doc.metrics(),
            StructuredDocument::ProfitLoss(doc) => doc.metrics(),
            StructuredDocument::Invoice(doc) => doc.metrics(),
            StructuredDocument::PurchaseOrder(doc) => doc.metrics(),
            StructuredDocument::SalarySlip(doc) => doc.metrics(),
            StructuredDocument::BalanceSheet(doc) => doc.metrics(),
            StructuredDocument::AuditPapers(doc) => doc.metrics(),
            StructuredDocument::AgreementContract(doc) => doc.metrics(),
        }
    }

    /// The document body alone, without the type tag. Used as "base data"
    /// in report prompts.
    pub fn body_json(&self) -> Value {
        let body = match self {
            StructuredDocument::BankStatement(doc) => serde_json::to_value(doc),
            StructuredDocument::GstReturn(doc) => serde_json::to_value(doc),
            StructuredDocument::TrialBalance(doc) => serde_json::to_value(doc),
            StructuredDocument::ProfitLoss(doc) => serde_json::to_value(doc),
            StructuredDocument::Invoice(doc) => serde_json::to_value(doc),
            StructuredDocument::PurchaseOrder(doc) => serde_json::to_value(doc),
            StructuredDocument::SalarySlip(doc) => serde_json::to_value(doc),
            StructuredDocument::BalanceSheet(doc) => serde_json::to_value(doc),
            StructuredDocument::AuditPapers(doc) => serde_json::to_value(doc),
            StructuredDocument::AgreementContract(doc) => serde_json::to_value(doc),
        };
        body.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_type_labels() {
        assert_eq!(
            DocumentType::from_label("Bank Statement"),
            Some(DocumentType::BankStatement)
        );
        assert_eq!(
            DocumentType::from_label("GST Document (GSTR-1/GSTR-3B)"),
            Some(DocumentType::GstReturn)
        );
        assert_eq!(
            DocumentType::from_label("Profit & Loss Statement"),
            Some(DocumentType::ProfitLoss)
        );
        assert_eq!(
            DocumentType::from_label("Salary Slip (Payroll Report)"),
            Some(DocumentType::SalarySlip)
        );
        assert_eq!(
            DocumentType::from_label("Contract/Agreement"),
            Some(DocumentType::AgreementContract)
        );
        assert_eq!(DocumentType::from_label("po"), Some(DocumentType::PurchaseOrder));
        assert_eq!(DocumentType::from_label("P&L"), Some(DocumentType::ProfitLoss));
        assert_eq!(DocumentType::from_label("Unknown"), None);
        assert!("recipe".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for kind in DocumentType::ALL {
            assert_eq!(DocumentType::from_label(kind.as_str()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_report_names_are_unique_per_type() {
        for kind in DocumentType::ALL {
            let mut names = kind.report_names().to_vec();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), 5, "{}", kind);
        }
    }

    #[test]
    fn test_anomaly_from_model_value() {
        let plain = Anomaly::from_model_value(&json!("Missing date on row 4")).unwrap();
        assert_eq!(plain.origin, AnomalyOrigin::Model);
        assert_eq!(plain.severity, None);

        let rich = Anomaly::from_model_value(&json!({
            "date": "2024-01-05",
            "reason": "Reconstructed amount from balance change",
            "risk_level": "high"
        }))
        .unwrap();
        assert_eq!(rich.description, "Reconstructed amount from balance change");
        assert_eq!(rich.severity, Some(Severity::Critical));
        assert_eq!(rich.date.as_deref(), Some("2024-01-05"));

        assert!(Anomaly::from_model_value(&json!(null)).is_none());
        assert!(Anomaly::from_model_value(&json!("  ")).is_none());
    }

    #[test]
    fn test_anomaly_dedup_key_normalizes_whitespace_and_case() {
        let a = Anomaly::reconciliation("Balance  mismatch at X").with_date(Some("2024-01-01"));
        let b = Anomaly::from_model_value(&json!({"description": "balance mismatch at x", "date": "2024-01-01"}))
            .unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
