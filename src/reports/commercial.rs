use super::{computed, serialized, ReportContext, ReportPlan};
use crate::documents::{Invoice, InvoiceLineItem, PurchaseOrder, PurchaseOrderItem, SalarySlip};
use crate::metrics::category_totals;
use crate::utils::{aging_bucket, days_between, percentage, round2, sum_present};
use crate::validation::{EquationCheck, BALANCE_TOLERANCE};
use serde::Serialize;
use serde_json::{json, Value};

pub(crate) fn invoice(doc: &Invoice, ctx: &ReportContext<'_>) -> ReportPlan {
    vec![
        ("sales_ledger", computed(sales_ledger(doc))),
        ("customer_outstanding_summary", computed(customer_outstanding(doc, ctx))),
        ("gst_breakdown", computed(gst_breakdown(doc))),
        ("invoice_aging", computed(invoice_aging(doc, ctx))),
        ("payment_due_summary", computed(payment_due(doc, ctx))),
    ]
}

fn sales_ledger(doc: &Invoice) -> Value {
    let lines: Vec<Value> = doc
        .line_items
        .iter()
        .map(|item| {
            json!({
                "description": item.description,
                "hsn_sac": item.hsn_sac,
                "quantity": item.quantity,
                "rate": item.rate,
                "amount": item.line_value(),
                "tax_rate": item.tax_rate,
            })
        })
        .collect();

    json!({
        "invoice_number": doc.invoice_number,
        "invoice_date": doc.invoice_date,
        "customer": doc.buyer.name,
        "customer_gstin": doc.buyer.gstin,
        "taxable_amount": doc.taxable_amount(),
        "tax_amount": doc.tax_amount(),
        "total_amount": doc.total_amount(),
        "payment_status": doc.payment.payment_status,
        "line_items": lines,
        "line_items_total": sum_present(doc.line_items.iter().map(InvoiceLineItem::line_value)).map(round2),
    })
}

fn customer_outstanding(doc: &Invoice, ctx: &ReportContext<'_>) -> Value {
    let outstanding = doc.outstanding_amount();
    let days_overdue = doc
        .parsed_due_date()
        .filter(|_| outstanding.is_some_and(|o| o > 0.0))
        .map(|due| days_between(due, ctx.as_of).max(0));

    json!({
        "customer": doc.buyer.name,
        "invoice_number": doc.invoice_number,
        "total_amount": doc.total_amount(),
        "paid_amount": doc.payment.paid_amount,
        "outstanding_amount": outstanding,
        "due_date": doc.due_date,
        "days_overdue": days_overdue,
    })
}

#[derive(Serialize)]
struct TaxComponent {
    component: String,
    amount: f64,
    rate: Option<f64>,
}

fn gst_breakdown(doc: &Invoice) -> Value {
    let taxable = doc.taxable_amount();
    let components: Vec<TaxComponent> = doc
        .tax_components()
        .into_iter()
        .map(|c| TaxComponent {
            rate: percentage(Some(c.amount), taxable),
            component: c.category,
            amount: c.amount,
        })
        .collect();
    let tax = doc.tax_amount();

    json!({
        "taxable_amount": taxable,
        "components": components,
        "total_tax": tax,
        "effective_rate": percentage(tax, taxable),
        "interstate": doc.amounts.igst.is_some_and(|igst| igst > 0.0),
    })
}

/// Age from the invoice date, as receivables are aged.
fn invoice_aging(doc: &Invoice, ctx: &ReportContext<'_>) -> Value {
    let age = doc.parsed_invoice_date().map(|date| days_between(date, ctx.as_of));

    json!({
        "invoice_number": doc.invoice_number,
        "invoice_date": doc.invoice_date,
        "as_of": ctx.as_of.format("%Y-%m-%d").to_string(),
        "age_in_days": age,
        "aging_bucket": age.map(aging_bucket),
        "outstanding_amount": doc.outstanding_amount(),
    })
}

fn payment_due(doc: &Invoice, ctx: &ReportContext<'_>) -> Value {
    let outstanding = doc.outstanding_amount();
    let days_until_due = doc.parsed_due_date().map(|due| days_between(ctx.as_of, due));
    let settled = doc.is_paid() || outstanding.is_some_and(|o| o.abs() < 0.005);
    let status = match days_until_due {
        _ if settled => "paid",
        Some(days) if days < 0 => "overdue",
        Some(_) => "due",
        None => "unscheduled",
    };

    json!({
        "invoice_number": doc.invoice_number,
        "due_date": doc.due_date,
        "payment_terms": doc.payment.payment_terms,
        "amount_due": outstanding,
        "days_until_due": days_until_due,
        "status": status,
    })
}

pub(crate) fn purchase_order(doc: &PurchaseOrder) -> ReportPlan {
    let total = doc.total_amount();

    vec![
        (
            "vendor_ledger",
            computed(json!({
                "vendor": doc.vendor_name(),
                "vendor_gstin": doc.vendor.gstin,
                "entries": [{
                    "po_number": doc.po_number,
                    "po_date": doc.po_date,
                    "amount": total,
                }],
                "total": total,
            })),
        ),
        (
            "purchase_summary",
            computed(json!({
                "po_number": doc.po_number,
                "po_date": doc.po_date,
                "delivery_date": doc.delivery_date,
                "item_count": doc.items.len(),
                "items_total": doc.items_total().map(round2),
                "subtotal": doc.amounts.subtotal,
                "tax_amount": doc.tax_amount(),
                "shipping_charges": doc.amounts.shipping_charges,
                "total_amount": total,
                "terms": doc.terms,
            })),
        ),
        ("category_spend_report", computed(category_spend(doc))),
        (
            "po_vs_invoice_matching",
            computed(json!({
                "po_number": doc.po_number,
                "po_amount": total,
                "matched_invoice": Value::Null,
                "status": "awaiting_invoice",
                "requires_multiple_documents": true,
            })),
        ),
        (
            "payables_summary",
            computed(json!({
                "vendor": doc.vendor_name(),
                "amount_payable": total,
                "payment_terms": doc.terms.payment_terms,
                "expected_delivery": doc.delivery_date,
            })),
        ),
    ]
}

fn category_spend(doc: &PurchaseOrder) -> Value {
    let categories: Vec<(String, Option<f64>)> = doc
        .items
        .iter()
        .map(|item| (item.spend_category(), item.line_value()))
        .collect();
    let spend = category_totals(
        categories.iter().map(|(category, amount)| (Some(category.as_str()), *amount)),
        "Other",
    );
    let total = sum_present(doc.items.iter().map(PurchaseOrderItem::line_value));

    json!({
        "categories": spend,
        "total_spend": total.map(round2),
    })
}

#[derive(Debug, Serialize)]
struct JournalLine {
    account: &'static str,
    debit: Option<f64>,
    credit: Option<f64>,
}

impl JournalLine {
    fn debit(account: &'static str, amount: Option<f64>) -> Option<Self> {
        amount.filter(|a| *a != 0.0).map(|a| Self {
            account,
            debit: Some(round2(a)),
            credit: None,
        })
    }

    fn credit(account: &'static str, amount: Option<f64>) -> Option<Self> {
        amount.filter(|a| *a != 0.0).map(|a| Self {
            account,
            debit: None,
            credit: Some(round2(a)),
        })
    }
}

#[derive(Debug, Serialize)]
struct PayrollJournal {
    entries: Vec<JournalLine>,
    total_debits: Option<f64>,
    total_credits: Option<f64>,
    balance_check: EquationCheck,
}

fn payroll_journal(doc: &SalarySlip) -> PayrollJournal {
    let d = &doc.deductions;
    let tds = sum_present([d.income_tax, d.professional_tax]);
    let other = sum_present([d.loan_deduction, d.other_deductions]);

    let entries: Vec<JournalLine> = [
        JournalLine::debit("Salary Expense", doc.gross_salary()),
        JournalLine::credit("PF Payable", d.provident_fund),
        JournalLine::credit("ESI Payable", d.esi),
        JournalLine::credit("TDS Payable", tds),
        JournalLine::credit("Other Deductions Payable", other),
        JournalLine::credit("Cash/Bank", doc.net_salary()),
    ]
    .into_iter()
    .flatten()
    .collect();

    let total_debits = sum_present(entries.iter().map(|e| e.debit)).map(round2);
    let total_credits = sum_present(entries.iter().map(|e| e.credit)).map(round2);

    PayrollJournal {
        balance_check: EquationCheck::new(total_debits, total_credits, BALANCE_TOLERANCE),
        entries,
        total_debits,
        total_credits,
    }
}

pub(crate) fn salary_slip(doc: &SalarySlip) -> ReportPlan {
    let d = &doc.deductions;
    let gross = doc.gross_salary();
    let period = json!({
        "month": doc.salary_period.month,
        "year": doc.salary_period.year,
    });

    vec![
        (
            "salary_summary",
            computed(json!({
                "employee_name": doc.employee.name,
                "employee_id": doc.employee.employee_id,
                "designation": doc.employee.designation,
                "period": period,
                "gross_salary": gross,
                "total_deductions": doc.total_deductions(),
                "net_salary": doc.net_salary(),
            })),
        ),
        (
            "allowances_deductions_report",
            computed(json!({
                "earnings": doc.earning_heads(),
                "basic_pay": doc.earnings.basic_pay,
                "total_allowances": doc.total_allowances(),
                "deductions": doc.deduction_heads(),
                "total_deductions": doc.total_deductions(),
            })),
        ),
        (
            "pf_esi_tds_summary",
            computed(json!({
                "provident_fund": d.provident_fund,
                "esi": d.esi,
                "tds": d.income_tax,
                "professional_tax": d.professional_tax,
                "total_statutory": sum_present([d.provident_fund, d.esi, d.income_tax, d.professional_tax])
                    .map(round2),
                "uan": doc.employee.uan,
                "pf_number": doc.employer.pf_number,
                "esi_number": doc.employer.esi_number,
            })),
        ),
        (
            "employee_cost_report",
            computed(json!({
                "employee_name": doc.employee_name(),
                "monthly_gross": gross,
                "annual_ctc": doc.annual_ctc(),
                "year_to_date": doc.year_to_date,
                "period": period,
            })),
        ),
        ("payroll_journal_entries", serialized(payroll_journal(doc))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::FinancialDocument;
    use crate::reports::PlannedReport;
    use chrono::NaiveDate;

    fn context(as_of: &str) -> ReportContext<'static> {
        ReportContext {
            base_data: String::new(),
            source_text: "",
            as_of: NaiveDate::parse_from_str(as_of, "%Y-%m-%d").unwrap(),
        }
    }

    fn unpaid_invoice() -> Invoice {
        Invoice::from_model_value(json!({
            "invoice_number": "INV-042",
            "invoice_date": "2024-01-01",
            "due_date": "2024-01-31",
            "buyer": {"name": "Globex"},
            "amounts": {"taxable_amount": "1,00,000", "cgst": 9000, "sgst": 9000, "total_amount": 118000},
            "payment": {"paid_amount": 18000}
        }))
        .unwrap()
    }

    #[test]
    fn test_invoice_aging_uses_invoice_date() {
        let aging = invoice_aging(&unpaid_invoice(), &context("2024-03-01"));
        assert_eq!(aging["age_in_days"], json!(60));
        assert_eq!(aging["aging_bucket"], json!("31-60"));
        assert_eq!(aging["outstanding_amount"], json!(100000.0));
    }

    #[test]
    fn test_overdue_invoice() {
        let ctx = context("2024-02-10");
        let due = payment_due(&unpaid_invoice(), &ctx);
        assert_eq!(due["days_until_due"], json!(-10));
        assert_eq!(due["status"], json!("overdue"));

        let outstanding = customer_outstanding(&unpaid_invoice(), &ctx);
        assert_eq!(outstanding["days_overdue"], json!(10));
    }

    #[test]
    fn test_paid_invoice_is_not_overdue() {
        let mut invoice = unpaid_invoice();
        invoice.payment.payment_status = Some("Paid".to_string());
        let ctx = context("2024-06-01");
        assert_eq!(payment_due(&invoice, &ctx)["status"], json!("paid"));
        assert!(customer_outstanding(&invoice, &ctx)["days_overdue"].is_null());
    }

    #[test]
    fn test_gst_rates() {
        let breakdown = gst_breakdown(&unpaid_invoice());
        assert_eq!(breakdown["components"][0]["component"], json!("CGST"));
        assert_eq!(breakdown["components"][0]["rate"], json!(9.0));
        assert_eq!(breakdown["effective_rate"], json!(18.0));
        assert_eq!(breakdown["interstate"], json!(false));
    }

    #[test]
    fn test_category_spend() {
        let po = PurchaseOrder::from_model_value(json!({
            "items": [
                {"description": "Steel rods", "quantity": 10, "rate": 500},
                {"description": "Steel rods", "amount": 2000},
                {"description": "Cement", "amount": "3,000"}
            ]
        }))
        .unwrap();
        let report = category_spend(&po);
        assert_eq!(report["categories"][0]["category"], json!("Steel rods"));
        assert_eq!(report["categories"][0]["amount"], json!(7000.0));
        assert_eq!(report["total_spend"], json!(10000.0));
    }

    #[test]
    fn test_payroll_journal_balances() {
        let slip = SalarySlip::from_model_value(json!({
            "earnings": {"basic_pay": 30000, "hra": 12000, "special_allowance": 8000},
            "deductions": {"provident_fund": 3600, "professional_tax": 200, "income_tax": 2200},
            "net_salary": 44000
        }))
        .unwrap();
        let journal = payroll_journal(&slip);
        assert_eq!(journal.entries.len(), 4);
        assert_eq!(journal.total_debits, Some(50000.0));
        assert_eq!(journal.total_credits, Some(50000.0));
        assert_eq!(journal.balance_check.is_balanced, Some(true));

        let plan = salary_slip(&slip);
        match &plan[3].1 {
            PlannedReport::Computed(Ok(cost)) => assert_eq!(cost["annual_ctc"], json!(600000.0)),
            _ => panic!("employee cost report should be computed"),
        }
    }
}
