// Prompts for classification, extraction, report generation and the
// multi-document audit.

use crate::documents::{
    AgreementContract, AuditPapers, BalanceSheet, BankStatement, FinancialDocument, GstReturn, Invoice,
    ProfitLoss, PurchaseOrder, SalarySlip, TrialBalance,
};
use crate::schema::DocumentType;
use serde_json::Value;

/// Appended to every prompt sent with `require_json`.
pub const JSON_DIRECTIVE: &str =
    "\n\nIMPORTANT: Return ONLY valid JSON. Do not include markdown formatting, code blocks, or any explanations.";

pub const CLASSIFICATION_LABELS: [&str; 10] = [
    "Bank Statement",
    "Invoice",
    "GST Document (GSTR-1/GSTR-3B)",
    "Trial Balance",
    "Profit & Loss Statement",
    "Purchase Order",
    "Salary Slip (Payroll Report)",
    "Balance Sheet",
    "Contract/Agreement",
    "Unknown",
];

const EXTRACTION_RULES: &str = r#"## RULES
- Extract ONLY values that are present in the document. Never invent, estimate or default a value.
- Use null for every field the document does not show. Use 0 only when the document literally prints zero.
- Numbers: remove currency symbols (₹, $, Rs.), thousands separators and spaces, e.g. "₹2,50,000" -> 250000, "$1,234.56" -> 1234.56.
- Dates: YYYY-MM-DD whenever the day, month and year can be read.
- Keep text fields exactly as printed (names, numbers, GSTINs)."#;

pub fn extraction_prompt(document_type: DocumentType, text: &str) -> String {
    match document_type {
        DocumentType::BankStatement => typed_extraction_prompt::<BankStatement>(text),
        DocumentType::GstReturn => typed_extraction_prompt::<GstReturn>(text),
        DocumentType::TrialBalance => typed_extraction_prompt::<TrialBalance>(text),
        DocumentType::ProfitLoss => typed_extraction_prompt::<ProfitLoss>(text),
        DocumentType::Invoice => typed_extraction_prompt::<Invoice>(text),
        DocumentType::PurchaseOrder => typed_extraction_prompt::<PurchaseOrder>(text),
        DocumentType::SalarySlip => typed_extraction_prompt::<SalarySlip>(text),
        DocumentType::BalanceSheet => typed_extraction_prompt::<BalanceSheet>(text),
        DocumentType::AuditPapers => typed_extraction_prompt::<AuditPapers>(text),
        DocumentType::AgreementContract => typed_extraction_prompt::<AgreementContract>(text),
    }
}

fn typed_extraction_prompt<T: FinancialDocument>(text: &str) -> String {
    let schema = serde_json::to_string_pretty(&T::output_schema()).unwrap_or_default();
    format!(
        "You are a financial document extraction expert. Extract {name} data from the OCR text below.\n\n\
         ## OUTPUT SCHEMA\n\
         Return a single JSON object matching this JSON Schema:\n\
         {schema}\n\n\
         {rules}\n\n\
         ## {upper} RULES\n\
         {specific}\n\n\
         ## OCR TEXT\n\
         {text}",
        name = T::DOCUMENT_TYPE.display_name(),
        upper = T::DOCUMENT_TYPE.display_name().to_uppercase(),
        schema = schema,
        rules = EXTRACTION_RULES,
        specific = T::extraction_rules(),
        text = text,
    )
}

pub fn classification_prompt(text: &str) -> String {
    let labels: Vec<String> = CLASSIFICATION_LABELS.iter().map(|l| format!("- {}", l)).collect();
    format!(
        "You are a financial document classifier.\n\
         Classify the document as one of:\n\
         {}\n\n\
         Return JSON only:\n\
         {{\"type\": \"\"}}\n\n\
         Document:\n\
         {}",
        labels.join("\n"),
        text
    )
}

/// Prompt for a report the model writes from the extracted data, where
/// `shape` is an example of the expected JSON.
pub fn report_prompt(instruction: &str, shape: &str, context_label: &str, context: &str) -> String {
    format!(
        "{}\nStructure the answer as:\n{}\n\n{}: {}\nUse null where the data does not support a value.",
        instruction, shape, context_label, context
    )
}

pub const BANK_CASH_FLOW_SHAPE: &str = r#"{
  "period": "",
  "operating_activities": {"inflows": [{"description": "", "amount": 0}], "outflows": [{"description": "", "amount": 0}], "net_operating": 0},
  "investing_activities": {"inflows": [], "outflows": [], "net_investing": 0},
  "financing_activities": {"inflows": [], "outflows": [], "net_financing": 0},
  "net_cash_flow": 0,
  "opening_balance": 0,
  "closing_balance": 0
}"#;

pub const BANK_ANOMALY_SHAPE: &str = r#"{
  "anomalies": [
    {"date": "", "description": "", "amount": 0, "type": "high_value/duplicate/suspicious/unusual_timing", "reason": "", "risk_level": "low/medium/high"}
  ],
  "summary": {"total_anomalies": 0, "high_risk": 0, "medium_risk": 0, "low_risk": 0},
  "recommendations": []
}"#;

pub const BANK_ANOMALY_INSTRUCTION: &str = "Analyze the bank transactions and identify anomalies:\n\
- Unusual transaction patterns\n\
- High-value transactions (above normal)\n\
- Duplicate transactions\n\
- Suspicious descriptions\n\
- Unusual timing patterns";

pub const GST_RECONCILIATION_SHAPE: &str = r#"{
  "period": "",
  "sales_reconciliation": {"gstr1_sales": 0, "gstr3b_sales": 0, "difference": 0, "reason": ""},
  "tax_reconciliation": {"gstr1_tax": 0, "gstr3b_tax": 0, "difference": 0, "reason": ""},
  "reconciliation_items": [],
  "recommendations": []
}"#;

pub const GSTR_INVOICE_MATCH_SHAPE: &str = r#"{
  "matched_invoices": [],
  "unmatched_invoices": [],
  "mismatch_reasons": [],
  "match_percentage": 0,
  "recommendations": []
}"#;

pub const AUDIT_SUMMARY_SHAPE: &str = r#"{
  "audit_period": "",
  "entity_name": "",
  "audit_type": "",
  "key_findings": [],
  "adjustments": [],
  "recommendations": [],
  "audit_opinion": ""
}"#;

pub const CONTRACT_ANALYSIS_SHAPE: &str = r#"{
  "contract_type": "",
  "parties": [],
  "key_terms": [],
  "obligations": [],
  "risks": [],
  "compliance_requirements": [],
  "summary": ""
}"#;

/// Plain-text commentary over already computed trial-balance figures.
pub fn management_analysis_prompt(figures: &Value) -> String {
    format!(
        "Based on the following financial data from a trial balance, provide a comprehensive growth performance analysis.\n\n\
         Financial Data:\n{}\n\n\
         Provide a detailed analysis covering:\n\
         1. Growth Performance Overview\n\
         2. Profitability Analysis\n\
         3. Liquidity and Solvency Assessment\n\
         4. Efficiency Metrics\n\
         5. Risk Assessment\n\
         6. Recommendations\n\n\
         Figures shown as null were not available; do not guess them.\n\
         Return a single text analysis (not JSON).",
        serde_json::to_string_pretty(figures).unwrap_or_default()
    )
}

const COMPREHENSIVE_AUDIT_SHAPE: &str = r#"{
  "header": {
    "title": "Financial Audit Report",
    "company_name": "",
    "financial_year": "",
    "audit_type": "Statutory Audit",
    "auditor_name": "",
    "date_of_audit": "",
    "audit_objective": "To provide an independent opinion on the fairness of financial statements and compliance with statutory requirements."
  },
  "executive_summary": {
    "objective": "",
    "total_income": 0,
    "net_profit": 0,
    "trial_balance_status": "",
    "balance_sheet_discrepancy": 0,
    "gst_variances": "",
    "tds_variances": ""
  },
  "detailed_financial_analysis": {
    "profitability_analysis": {"revenue": {"total": 0, "breakdown": []}, "direct_expenses": {"total": 0, "breakdown": []}, "indirect_expenses": {"total": 0, "breakdown": []}, "net_profit": 0, "recommendations": []},
    "balance_sheet_assessment": {"total_assets": 0, "total_liabilities_and_equity": 0, "imbalance": 0, "recommendations": []},
    "liquidity_and_working_capital": {"cash_and_bank_balances": 0, "conclusion": ""}
  },
  "cash_and_bank_review": {"coherence": "", "cash_flows": "", "major_bank_transactions": [], "conclusion": ""},
  "gst_compliance_review": {"output_gst_liability": 0, "input_tax_credit_claimed": 0, "net_gst_payable": 0, "actual_gst_paid": 0, "variance": 0, "compliance_status": ""},
  "tds_compliance_review": {"cumulative_tds": 0, "recorded_tds_payable": 0, "tds_paid": 0, "variance": 0, "recommendations": []},
  "key_findings_and_risks": [{"finding": "", "risk_level": "low/medium/high", "impact": ""}],
  "recommendations": [""]
}"#;

/// `manifest` lists one `filename (type)` line per document.
pub fn comprehensive_audit_prompt(manifest: &[String], combined_text: &str) -> String {
    let listing: Vec<String> = manifest.iter().map(|line| format!("- {}", line)).collect();
    format!(
        "You are a professional auditor analyzing multiple financial documents to generate a comprehensive Financial Audit Report.\n\n\
         The following documents have been provided:\n{}\n\n\
         Extracted text from all documents:\n{}\n\n\
         Generate the report in this JSON format:\n{}\n\n\
         Instructions:\n\
         1. Take every figure, date and company detail from the documents; use null where none is given\n\
         2. Calculate totals, variances and discrepancies between documents\n\
         3. Identify GST and TDS compliance issues\n\
         4. Analyze balance sheet imbalances and ledger behaviour\n\
         5. Give specific, actionable recommendations\n\
         6. Use Indian currency format (INR) and Indian accounting standards",
        listing.join("\n"),
        combined_text,
        COMPREHENSIVE_AUDIT_SHAPE
    )
}

const GST_EXCEL_AUDIT_SHAPE: &str = r#"{
  "header": {
    "title": "GST Compliance Audit Report",
    "company_name": "",
    "financial_year": "",
    "date": "",
    "audit_type": "GST Compliance Audit"
  },
  "executive_summary": {
    "total_output_tax": 0,
    "total_input_tax": 0,
    "net_tax_payable": 0,
    "itc_available": 0,
    "itc_utilized": 0,
    "reconciliation_status": "",
    "key_highlights": []
  },
  "reconciliation_summary": {
    "gstr2b_vs_purchase_register": {"gstr2b_total": 0, "purchase_register_total": 0, "difference": 0, "variance_percentage": 0},
    "vendor_matching": {"total_vendors_in_master": 0, "vendors_in_purchase_register": 0, "matched_vendors": 0, "unmatched_vendors": []},
    "itc_reconciliation": {"gstr2b_itc": 0, "claimed_itc": 0, "difference": 0, "reconciliation_status": ""}
  },
  "invoice_level_reconciliation": {
    "total_invoices": 0,
    "reconciled_invoices": 0,
    "unreconciled_invoices": 0,
    "invoice_details": [{"invoice_number": "", "vendor_gstin": "", "vendor_name": "", "invoice_date": "", "taxable_value": 0, "itc_claimed": 0, "reconciliation_status": "matched/unmatched", "variance": 0, "remarks": ""}]
  },
  "vendor_wise_compliance_review": {
    "total_vendors": 0,
    "vendor_details": [{"vendor_name": "", "vendor_gstin": "", "total_invoices": 0, "total_taxable_value": 0, "total_itc_claimed": 0, "compliance_status": "compliant/non-compliant", "issues": []}],
    "summary": ""
  },
  "risk_assessment": {"high_risk_items": [], "medium_risk_items": [], "low_risk_items": [], "overall_risk_level": "low/medium/high"},
  "recommendations": [""],
  "auditors_conclusion": ""
}"#;

/// GST compliance audit over GSTR-2B, purchase register and vendor master
/// spreadsheets.
pub fn gst_excel_audit_prompt(file_types: &[String], summary_text: &str, data_text: &str) -> String {
    let listing: Vec<String> = file_types.iter().map(|t| format!("- {}", t.to_uppercase())).collect();
    format!(
        "You are a professional GST auditor analyzing multiple Excel files to generate a GST Compliance Audit Report.\n\n\
         The following Excel files have been provided:\n{}\n\n\
         Excel data summary:\n{}\n\n\
         Complete Excel data (all rows):\n{}\n\n\
         Generate the report in this JSON format:\n{}\n\n\
         Instructions:\n\
         1. Take company names, vendor names, invoice numbers, GSTINs, amounts and dates from the rows above; never invent example values\n\
         2. Match invoices between GSTR-2B and the purchase register by invoice number, date and amount\n\
         3. Match vendors between the vendor master and the purchase register by name or GSTIN\n\
         4. Compute totals from the rows; use null where the data is genuinely absent\n\
         5. Dates in YYYY-MM-DD, amounts in INR, GSTINs exactly as written",
        listing.join("\n"),
        summary_text,
        data_text,
        GST_EXCEL_AUDIT_SHAPE
    )
}
