use super::{computed, PlannedReport, ReportContext, ReportPlan};
use crate::config::PipelineConfig;
use crate::documents::{BankStatement, BankTransaction, GstReturn};
use crate::llm::prompts::{
    report_prompt, BANK_ANOMALY_INSTRUCTION, BANK_ANOMALY_SHAPE, BANK_CASH_FLOW_SHAPE,
    GSTR_INVOICE_MATCH_SHAPE, GST_RECONCILIATION_SHAPE,
};
use crate::metrics::category_totals;
use crate::utils::{difference, percentage, round2, sum_present, truncate_chars};
use crate::validation::{EquationCheck, BALANCE_TOLERANCE};
use serde_json::{json, Value};

const TOP_ROWS: usize = 10;
const ANOMALY_PROMPT_ROWS: usize = 100;

pub(crate) fn bank_statement(doc: &BankStatement, ctx: &ReportContext<'_>, config: &PipelineConfig) -> ReportPlan {
    let rows_json = serde_json::to_string_pretty(
        &doc.transactions.iter().take(ANOMALY_PROMPT_ROWS).collect::<Vec<_>>(),
    )
    .unwrap_or_default();

    vec![
        (
            "cash_flow_statement",
            PlannedReport::Generated(report_prompt(
                "Generate a Cash Flow Statement from the bank statement data, classifying every flow as operating, investing or financing.",
                BANK_CASH_FLOW_SHAPE,
                "Base Data",
                &ctx.base_data,
            )),
        ),
        ("ledger_entries", computed(ledger_entries(doc))),
        ("payment_receipt_summary", computed(payment_receipt_summary(doc))),
        (
            "anomaly_report",
            PlannedReport::Generated(report_prompt(
                BANK_ANOMALY_INSTRUCTION,
                BANK_ANOMALY_SHAPE,
                "Transactions",
                truncate_chars(&rows_json, config.report_text_limit),
            )),
        ),
        ("bank_reconciliation", computed(bank_reconciliation(doc))),
    ]
}

fn ledger_entries(doc: &BankStatement) -> Value {
    let entries: Vec<Value> = doc
        .transactions
        .iter()
        .map(|t| {
            json!({
                "date": t.date,
                "description": t.description,
                "debit": t.debit,
                "credit": t.credit,
                "balance": t.balance,
                "category": t.category,
                "reference": t.reference_number,
            })
        })
        .collect();

    json!({
        "entries": entries,
        "total_debits": round2(doc.computed_total_debits()),
        "total_credits": round2(doc.computed_total_credits()),
    })
}

fn largest<'a>(rows: &[&'a BankTransaction], amount: fn(&BankTransaction) -> Option<f64>) -> Vec<&'a BankTransaction> {
    let mut ranked = rows.to_vec();
    ranked.sort_by(|a, b| {
        amount(b)
            .unwrap_or(0.0)
            .total_cmp(&amount(a).unwrap_or(0.0))
    });
    ranked.truncate(TOP_ROWS);
    ranked
}

fn payment_receipt_summary(doc: &BankStatement) -> Value {
    let receipts: Vec<&BankTransaction> = doc
        .transactions
        .iter()
        .filter(|t| t.credit.is_some_and(|c| c > 0.0))
        .collect();
    let payments: Vec<&BankTransaction> = doc
        .transactions
        .iter()
        .filter(|t| t.debit.is_some_and(|d| d > 0.0))
        .collect();

    let receipt_categories = category_totals(
        receipts.iter().map(|t| (t.category.as_deref(), t.credit)),
        "Other",
    );
    let payment_categories = category_totals(
        payments.iter().map(|t| (t.category.as_deref(), t.debit)),
        "Other",
    );

    json!({
        "total_receipts": round2(doc.computed_total_credits()),
        "total_payments": round2(doc.computed_total_debits()),
        "stated_total_deposits": doc.total_deposits,
        "stated_total_withdrawals": doc.total_withdrawals,
        "receipt_count": receipts.len(),
        "payment_count": payments.len(),
        "category_breakdown": {
            "receipts": receipt_categories,
            "payments": payment_categories,
        },
        "top_10_receipts": largest(&receipts, |t| t.credit),
        "top_10_payments": largest(&payments, |t| t.debit),
    })
}

fn bank_reconciliation(doc: &BankStatement) -> Value {
    let opening = doc.effective_opening_balance();
    let credits = doc.computed_total_credits();
    let debits = doc.computed_total_debits();
    let bank_balance = doc.effective_closing_balance();
    let check = EquationCheck::new(
        bank_balance,
        opening.map(|o| o + credits - debits),
        BALANCE_TOLERANCE,
    );
    let book_balance = check.right.map(round2);

    json!({
        "opening_balance": opening,
        "total_credits": round2(credits),
        "total_debits": round2(debits),
        "book_balance": book_balance,
        "bank_balance": bank_balance,
        "difference": check.difference,
        "reconciled": check.is_balanced,
        "unreconciled_items": doc.summary.anomalies,
    })
}

pub(crate) fn gst_return(doc: &GstReturn, ctx: &ReportContext<'_>) -> ReportPlan {
    vec![
        (
            "gst_reconciliation",
            PlannedReport::Generated(report_prompt(
                "Generate a GST Reconciliation Sheet comparing the GSTR-1 and GSTR-3B figures.",
                GST_RECONCILIATION_SHAPE,
                "Base Data",
                &ctx.base_data,
            )),
        ),
        ("itc_utilization", computed(itc_utilization(doc))),
        ("output_input_tax_summary", computed(output_input_tax_summary(doc))),
        ("gst_liability_statement", computed(gst_liability_statement(doc))),
        (
            "gstr_invoice_match",
            PlannedReport::Generated(report_prompt(
                "Generate a GSTR vs Invoice Match Report.",
                GSTR_INVOICE_MATCH_SHAPE,
                "Base Data",
                &ctx.base_data,
            )),
        ),
    ]
}

fn itc_utilization(doc: &GstReturn) -> Value {
    let output = doc.effective_output_tax();
    let available = doc.input_tax_credit;
    let utilized = match (available, output) {
        (Some(itc), Some(out)) => Some(round2(itc.min(out))),
        _ => None,
    };

    json!({
        "period": doc.period,
        "total_itc_available": available,
        "output_tax": output,
        "itc_utilized": utilized,
        "itc_carried_forward": difference(available, utilized).map(|v| round2(v.max(0.0))),
        "utilization_percentage": percentage(utilized, available),
        "cash_liability": doc.effective_net_payable(),
    })
}

fn output_input_tax_summary(doc: &GstReturn) -> Value {
    json!({
        "output_tax": {
            "cgst": doc.cgst,
            "sgst": doc.sgst,
            "igst": doc.igst,
            "cess": doc.cess,
            "total": doc.effective_output_tax(),
        },
        "input_tax": {
            "total": doc.input_tax_credit,
        },
        "reverse_charge": doc.reverse_charge,
        "net_tax_payable": doc.effective_net_payable(),
        "comparison_chart": {
            "labels": ["Output Tax", "Input Tax Credit"],
            "values": [doc.effective_output_tax(), doc.input_tax_credit],
        },
    })
}

fn gst_liability_statement(doc: &GstReturn) -> Value {
    let tax_liability = doc.effective_net_payable();
    let total_payable = doc.total_payable.or_else(|| {
        sum_present([tax_liability, doc.interest_payable, doc.late_fee, doc.penalty]).map(round2)
    });

    json!({
        "gstin": doc.gstin,
        "period": doc.period,
        "filing_date": doc.filing_date,
        "filing_status": doc.filing_status,
        "tax_liability": tax_liability,
        "interest": doc.interest_payable,
        "late_fee": doc.late_fee,
        "penalties": doc.penalty,
        "total_payable": total_payable,
        "payment_status": doc.payment_status,
        "payment_date": doc.payment_date,
    })
}
