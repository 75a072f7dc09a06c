use super::{computed, serialized, PlannedReport, ReportPlan};
use crate::documents::{
    Assets, BalanceSheet, LedgerAccountType, Liabilities, ProfitLoss, TrialBalance, TrialBalanceAccount,
};
use crate::llm::prompts::management_analysis_prompt;
use crate::metrics::{category_totals, present_amounts, CategoryAmount};
use crate::utils::{difference, percentage, ratio, round2, sum_present};
use crate::validation::{EquationCheck, BALANCE_TOLERANCE};
use serde::Serialize;
use serde_json::{json, Value};

const COGS_KEYWORDS: [&str; 4] = ["cogs", "cost of goods", "cost of materials", "cost of sales"];
const MATERIAL_KEYWORDS: [&str; 2] = ["material", "purchase"];
const EMPLOYEE_KEYWORDS: [&str; 4] = ["employee", "salar", "wages", "staff"];
const FINANCE_KEYWORDS: [&str; 3] = ["finance", "interest", "bank charges"];
const DEPRECIATION_KEYWORDS: [&str; 3] = ["depreciation", "amortisation", "amortization"];
const OTHER_INCOME_KEYWORDS: [&str; 3] = ["other", "miscellaneous", "interest"];
const CASH_KEYWORDS: [&str; 2] = ["cash", "bank"];
const INVENTORY_KEYWORDS: [&str; 2] = ["inventory", "stock"];
const RECEIVABLE_KEYWORDS: [&str; 2] = ["receivable", "debtor"];
const PAYABLE_KEYWORDS: [&str; 2] = ["payable", "creditor"];
const FIXED_ASSET_KEYWORDS: [&str; 9] = [
    "equipment", "fixed", "property", "plant", "machinery", "furniture", "building", "land", "vehicle",
];
const LONG_TERM_KEYWORDS: [&str; 5] = ["long term", "long-term", "term loan", "non-current", "debenture"];

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Figures every trial-balance report is built from. Amounts are on each
/// account's natural side; `None` means the trial balance has no account
/// of that kind.
#[derive(Debug, Clone, Serialize)]
struct LedgerFigures {
    total_assets: Option<f64>,
    total_liabilities: Option<f64>,
    total_equity: Option<f64>,
    revenue: Option<f64>,
    expenses: Option<f64>,
    cogs: Option<f64>,
    gross_profit: Option<f64>,
    operating_expenses: Option<f64>,
    operating_profit: Option<f64>,
    net_profit: Option<f64>,
    other_income: Option<f64>,
    cost_of_materials: Option<f64>,
    employee_benefits: Option<f64>,
    finance_costs: Option<f64>,
    depreciation_amortisation: Option<f64>,
    cash_and_bank: Option<f64>,
    inventories: Option<f64>,
    trade_receivables: Option<f64>,
    trade_payables: Option<f64>,
    fixed_assets: Option<f64>,
    current_assets: Option<f64>,
    long_term_liabilities: Option<f64>,
    current_liabilities: Option<f64>,
}

impl LedgerFigures {
    fn from_trial_balance(tb: &TrialBalance) -> Self {
        let total_assets = type_total(tb, LedgerAccountType::Asset);
        let total_liabilities = type_total(tb, LedgerAccountType::Liability);
        let revenue = type_total(tb, LedgerAccountType::Income);
        let expenses = type_total(tb, LedgerAccountType::Expense);

        let cogs = named_total(tb, LedgerAccountType::Expense, &COGS_KEYWORDS);
        let finance_costs = named_total(tb, LedgerAccountType::Expense, &FINANCE_KEYWORDS);
        let gross_profit = revenue.map(|r| round2(r - cogs.unwrap_or(0.0)));
        let operating_expenses = expenses
            .map(|e| round2(e - cogs.unwrap_or(0.0) - finance_costs.unwrap_or(0.0)));
        let net_profit = match (revenue, expenses) {
            (None, None) => None,
            (r, e) => Some(round2(r.unwrap_or(0.0) - e.unwrap_or(0.0))),
        };

        let fixed_assets = named_total(tb, LedgerAccountType::Asset, &FIXED_ASSET_KEYWORDS);
        let long_term_liabilities = named_total(tb, LedgerAccountType::Liability, &LONG_TERM_KEYWORDS);

        Self {
            total_assets,
            total_liabilities,
            total_equity: type_total(tb, LedgerAccountType::Equity),
            revenue,
            expenses,
            cogs,
            gross_profit,
            operating_expenses,
            operating_profit: difference(gross_profit, operating_expenses).map(round2),
            net_profit,
            other_income: named_total(tb, LedgerAccountType::Income, &OTHER_INCOME_KEYWORDS),
            cost_of_materials: cogs.or_else(|| named_total(tb, LedgerAccountType::Expense, &MATERIAL_KEYWORDS)),
            employee_benefits: named_total(tb, LedgerAccountType::Expense, &EMPLOYEE_KEYWORDS),
            finance_costs,
            depreciation_amortisation: named_total(tb, LedgerAccountType::Expense, &DEPRECIATION_KEYWORDS),
            cash_and_bank: named_total(tb, LedgerAccountType::Asset, &CASH_KEYWORDS),
            inventories: named_total(tb, LedgerAccountType::Asset, &INVENTORY_KEYWORDS),
            trade_receivables: named_total(tb, LedgerAccountType::Asset, &RECEIVABLE_KEYWORDS),
            trade_payables: named_total(tb, LedgerAccountType::Liability, &PAYABLE_KEYWORDS),
            fixed_assets,
            current_assets: total_assets.map(|a| round2(a - fixed_assets.unwrap_or(0.0))),
            long_term_liabilities,
            current_liabilities: total_liabilities
                .map(|l| round2(l - long_term_liabilities.unwrap_or(0.0))),
        }
    }

    fn quick_assets(&self) -> Option<f64> {
        self.current_assets
            .map(|ca| round2(ca - self.inventories.unwrap_or(0.0)))
    }
}

fn type_total(tb: &TrialBalance, kind: LedgerAccountType) -> Option<f64> {
    sum_present(tb.accounts_of(kind).map(|a| Some(a.natural_balance()))).map(round2)
}

/// Natural-side total of the accounts of `kind` whose name mentions any of
/// `keywords`.
fn named_total(tb: &TrialBalance, kind: LedgerAccountType, keywords: &[&str]) -> Option<f64> {
    sum_present(
        tb.accounts_of(kind)
            .filter(|a| matches_any(a.name(), keywords))
            .map(|a| Some(a.natural_balance())),
    )
    .map(round2)
}

fn account_rows<'a>(accounts: impl Iterator<Item = &'a TrialBalanceAccount>) -> Vec<CategoryAmount> {
    accounts
        .map(|a| CategoryAmount {
            category: a.name().to_string(),
            amount: round2(a.natural_balance()),
        })
        .collect()
}

pub(crate) fn trial_balance(tb: &TrialBalance) -> ReportPlan {
    let figures = LedgerFigures::from_trial_balance(tb);
    let ratios = trial_balance_ratios(&figures);

    let management_base = json!({
        "entity_name": tb.entity_name,
        "period": tb.period,
        "total_accounts": tb.balances.len(),
        "total_debits": round2(tb.computed_total_debits()),
        "total_credits": round2(tb.computed_total_credits()),
        "is_balanced": tb.is_balanced,
        "difference": tb.difference,
        "key_figures": figures,
        "ratios": ratios,
    });
    let prompt = management_analysis_prompt(&json!({
        "key_figures": figures,
        "ratios": ratios,
    }));

    vec![
        ("profit_loss", computed(trial_balance_profit_loss(tb, &figures))),
        ("balance_sheet", computed(trial_balance_position(tb, &figures))),
        ("cash_flow", computed(trial_balance_cash_flow(tb, &figures))),
        ("accounting_ratios", computed(ratios)),
        (
            "management_report",
            PlannedReport::Commentary {
                base: management_base,
                prompt,
            },
        ),
    ]
}

fn trial_balance_profit_loss(tb: &TrialBalance, f: &LedgerFigures) -> Value {
    json!({
        "entity_name": tb.entity_name,
        "period": tb.period,
        "revenue": f.revenue,
        "other_income": f.other_income,
        "cogs": f.cogs,
        "gross_profit": f.gross_profit,
        "operating_expenses": f.operating_expenses,
        "operating_profit": f.operating_profit,
        "finance_costs": f.finance_costs,
        "expenses": f.expenses,
        "net_profit": f.net_profit,
        "expense_heads": {
            "cost_of_materials": f.cost_of_materials,
            "employee_benefits": f.employee_benefits,
            "finance_costs": f.finance_costs,
            "depreciation_amortisation": f.depreciation_amortisation,
        },
        "income_accounts": account_rows(tb.accounts_of(LedgerAccountType::Income)),
        "expense_accounts": account_rows(tb.accounts_of(LedgerAccountType::Expense)),
    })
}

/// Before closing entries, assets equal liabilities plus equity plus the
/// period's undistributed profit.
fn trial_balance_position(tb: &TrialBalance, f: &LedgerFigures) -> Value {
    let claims = sum_present([f.total_liabilities, f.total_equity, f.net_profit]).map(round2);
    let check = EquationCheck::new(f.total_assets, claims, BALANCE_TOLERANCE);

    json!({
        "entity_name": tb.entity_name,
        "period": tb.period,
        "assets": account_rows(tb.accounts_of(LedgerAccountType::Asset)),
        "liabilities": account_rows(tb.accounts_of(LedgerAccountType::Liability)),
        "equity": account_rows(tb.accounts_of(LedgerAccountType::Equity)),
        "total_assets": f.total_assets,
        "total_liabilities": f.total_liabilities,
        "total_equity": f.total_equity,
        "profit_for_period": f.net_profit,
        "current_assets": f.current_assets,
        "fixed_assets": f.fixed_assets,
        "cash_and_bank_balances": f.cash_and_bank,
        "inventories": f.inventories,
        "trade_receivables": f.trade_receivables,
        "current_liabilities": f.current_liabilities,
        "long_term_liabilities": f.long_term_liabilities,
        "trade_payables": f.trade_payables,
        "equation": check,
    })
}

/// Indirect-method operating cash flow. Working-capital movements, investing
/// and financing flows need an opening trial balance and stay null.
fn trial_balance_cash_flow(tb: &TrialBalance, f: &LedgerFigures) -> Value {
    let operating = f
        .net_profit
        .map(|p| round2(p + f.depreciation_amortisation.unwrap_or(0.0)));

    json!({
        "entity_name": tb.entity_name,
        "period": tb.period,
        "net_profit": f.net_profit,
        "depreciation": f.depreciation_amortisation,
        "interest_expense": f.finance_costs,
        "operating_cash_flow_before_working_capital": operating,
        "working_capital_changes": Value::Null,
        "investing_activities": Value::Null,
        "financing_activities": Value::Null,
        "cash_at_end": f.cash_and_bank,
    })
}

fn trial_balance_ratios(f: &LedgerFigures) -> Value {
    json!({
        "liquidity": {
            "current_ratio": ratio(f.current_assets, f.current_liabilities),
            "quick_ratio": ratio(f.quick_assets(), f.current_liabilities),
            "cash_ratio": ratio(f.cash_and_bank, f.current_liabilities),
        },
        "profitability": {
            "gross_margin": percentage(f.gross_profit, f.revenue),
            "operating_margin": percentage(f.operating_profit, f.revenue),
            "net_profit_margin": percentage(f.net_profit, f.revenue),
            "return_on_equity": percentage(f.net_profit, f.total_equity),
            "return_on_assets": percentage(f.net_profit, f.total_assets),
        },
        "efficiency": {
            "asset_turnover": ratio(f.revenue, f.total_assets),
            "inventory_turnover": ratio(f.cogs, f.inventories),
            "receivables_turnover": ratio(f.revenue, f.trade_receivables),
            "payables_turnover": ratio(f.cogs, f.trade_payables),
        },
        "solvency": {
            "debt_to_equity": ratio(f.total_liabilities, f.total_equity),
        },
        "working_capital": difference(f.current_assets, f.current_liabilities).map(round2),
    })
}

pub(crate) fn profit_loss(pl: &ProfitLoss) -> ReportPlan {
    let revenue = pl.total_revenue();
    let expenses = pl.total_expenses();
    let r = &pl.revenue;
    let e = &pl.expenses;

    let revenue_breakdown = if r.revenue_breakdown.is_empty() {
        present_amounts(&[
            ("Sales", r.sales),
            ("Service Income", r.service_income),
            ("Other Income", r.other_income),
        ])
    } else {
        category_totals(
            r.revenue_breakdown
                .iter()
                .map(|row| (row.category.as_deref(), row.amount)),
            "Other",
        )
    };

    let operating_expenses = sum_present([e.cost_of_goods_sold, e.operating_expenses, e.administrative_expenses]);

    vec![
        (
            "profitability_summary",
            computed(json!({
                "entity_name": pl.entity_name,
                "period": pl.period,
                "total_revenue": revenue,
                "total_expenses": expenses,
                "gross_profit": pl.gross_profit(),
                "operating_profit": pl.operating_profit(),
                "profit_before_tax": pl.profitability.profit_before_tax,
                "net_profit": pl.net_profit(),
                "gross_margin": pl.gross_margin(),
                "net_margin": pl.net_margin(),
            })),
        ),
        (
            "revenue_vs_expense_analysis",
            computed(json!({
                "revenue": {"total": revenue, "breakdown": revenue_breakdown},
                "expenses": {"total": expenses, "breakdown": pl.expense_heads()},
                "net_result": pl.net_profit(),
                "expense_to_revenue": percentage(expenses, revenue),
            })),
        ),
        (
            "margin_kpis",
            computed(json!({
                "gross_margin": pl.gross_margin(),
                "operating_margin": percentage(pl.operating_profit(), revenue),
                "net_margin": pl.net_margin(),
                "expense_ratio": percentage(expenses, revenue),
            })),
        ),
        (
            "operating_vs_non_operating_split",
            computed(json!({
                "operating": {
                    "revenue": pl.operating_revenue(),
                    "expenses": operating_expenses,
                    "profit": pl.operating_profit(),
                },
                "non_operating": {
                    "revenue": r.other_income,
                    "expenses": e.financial_expenses,
                    "net": match (r.other_income, e.financial_expenses) {
                        (None, None) => None,
                        (income, cost) => Some(round2(income.unwrap_or(0.0) - cost.unwrap_or(0.0))),
                    },
                },
            })),
        ),
        (
            "period_wise_profit_trend",
            computed(json!({
                "periods": [{
                    "period": pl.period,
                    "revenue": revenue,
                    "expenses": expenses,
                    "gross_profit": pl.gross_profit(),
                    "net_profit": pl.net_profit(),
                }],
                "trend": Value::Null,
                "requires_multiple_documents": true,
            })),
        ),
    ]
}

#[derive(Serialize)]
struct Schedule<'a, T: Serialize> {
    #[serde(flatten)]
    lines: &'a T,
    total: Option<f64>,
    component_sum: Option<f64>,
}

#[derive(Serialize)]
struct Schedules<'a> {
    assets: Schedule<'a, Assets>,
    liabilities: Schedule<'a, Liabilities>,
}

pub(crate) fn balance_sheet(bs: &BalanceSheet) -> ReportPlan {
    let total_assets = bs.total_assets();
    let total_liabilities = bs.total_liabilities();
    let total_equity = bs.total_equity();
    let claims = sum_present([total_liabilities, total_equity])
        .or(bs.summary.total_liabilities_and_equity);
    let check = EquationCheck::new(total_assets, claims, BALANCE_TOLERANCE);

    let current_assets = bs.assets.current_assets;
    let current_liabilities = bs.liabilities.current_liabilities;

    vec![
        (
            "asset_liability_schedules",
            serialized(Schedules {
                assets: Schedule {
                    lines: &bs.assets,
                    total: total_assets,
                    component_sum: bs.assets.component_sum(),
                },
                liabilities: Schedule {
                    lines: &bs.liabilities,
                    total: total_liabilities,
                    component_sum: bs.liabilities.component_sum(),
                },
            }),
        ),
        (
            "net_worth_statement",
            computed(json!({
                "total_assets": total_assets,
                "total_liabilities": total_liabilities,
                "net_worth": difference(total_assets, total_liabilities).map(round2),
                "equity": total_equity,
            })),
        ),
        (
            "solvency_liquidity_summary",
            computed(json!({
                "current_ratio": ratio(current_assets, current_liabilities),
                "debt_to_equity": ratio(bs.liabilities.debt(), total_equity),
                "liabilities_to_equity": ratio(total_liabilities, total_equity),
                "working_capital": bs.working_capital().map(round2),
                "solvency_ratio": ratio(total_assets, total_liabilities),
            })),
        ),
        (
            "equity_movement_statement",
            computed(json!({
                "opening_equity": Value::Null,
                "share_capital": bs.equity.share_capital,
                "reserves": bs.equity.reserves,
                "retained_earnings": bs.equity.retained_earnings,
                "closing_equity": total_equity,
                "movement": Value::Null,
                "requires_multiple_documents": true,
            })),
        ),
        (
            "financial_position_report",
            computed(json!({
                "entity_name": bs.entity_name,
                "period": bs.period,
                "assets": {
                    "total": total_assets,
                    "current": current_assets,
                    "non_current": difference(total_assets, current_assets).map(round2),
                },
                "liabilities": {
                    "total": total_liabilities,
                    "current": current_liabilities,
                    "non_current": difference(total_liabilities, current_liabilities).map(round2),
                },
                "equity": {
                    "total": total_equity,
                    "share_capital": bs.equity.share_capital,
                    "reserves": bs.equity.reserves,
                    "retained_earnings": bs.equity.retained_earnings,
                },
                "equation": check,
            })),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::FinancialDocument;

    fn report(plan: &ReportPlan, name: &str) -> Value {
        match plan.iter().find(|(n, _)| *n == name) {
            Some((_, PlannedReport::Computed(Ok(value)))) => value.clone(),
            Some((_, PlannedReport::Commentary { base, .. })) => base.clone(),
            _ => panic!("{} is not a computed report", name),
        }
    }

    fn ledger() -> TrialBalance {
        TrialBalance::from_model_value(json!({
            "entity_name": "Acme Traders",
            "balances": [
                {"account_name": "Cash in Hand", "account_type": "Asset", "debit": 20000},
                {"account_name": "Bank Account", "account_type": "Asset", "debit": 80000},
                {"account_name": "Inventory", "account_type": "Asset", "debit": 50000},
                {"account_name": "Plant & Machinery", "account_type": "Asset", "debit": 150000},
                {"account_name": "Accounts Payable", "account_type": "Liability", "credit": 60000},
                {"account_name": "Term Loan", "account_type": "Liability", "credit": 40000},
                {"account_name": "Share Capital", "account_type": "Equity", "credit": 150000},
                {"account_name": "Sales", "account_type": "Income", "credit": 300000},
                {"account_name": "Cost of Goods Sold", "account_type": "Expense", "debit": 180000},
                {"account_name": "Salaries", "account_type": "Expense", "debit": 50000},
                {"account_name": "Depreciation", "account_type": "Expense", "debit": 20000}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_ledger_figures() {
        let f = LedgerFigures::from_trial_balance(&ledger());
        assert_eq!(f.total_assets, Some(300000.0));
        assert_eq!(f.revenue, Some(300000.0));
        assert_eq!(f.cogs, Some(180000.0));
        assert_eq!(f.gross_profit, Some(120000.0));
        assert_eq!(f.net_profit, Some(50000.0));
        assert_eq!(f.operating_profit, Some(50000.0));
        assert_eq!(f.cash_and_bank, Some(100000.0));
        assert_eq!(f.current_assets, Some(150000.0));
        assert_eq!(f.current_liabilities, Some(60000.0));
        assert_eq!(f.other_income, None);
    }

    #[test]
    fn test_trial_balance_position_includes_period_profit() {
        let plan = trial_balance(&ledger());
        let position = report(&plan, "balance_sheet");
        // 300000 = 100000 + 150000 + 50000
        assert_eq!(position["equation"]["is_balanced"], json!(true));
        assert_eq!(position["equation"]["difference"], json!(0.0));
    }

    #[test]
    fn test_trial_balance_ratios_never_divide_by_missing() {
        let plan = trial_balance(&ledger());
        let ratios = report(&plan, "accounting_ratios");
        assert_eq!(ratios["liquidity"]["current_ratio"], json!(2.5));
        assert_eq!(ratios["liquidity"]["quick_ratio"], json!(1.67));
        assert_eq!(ratios["efficiency"]["receivables_turnover"], Value::Null);

        let management = report(&plan, "management_report");
        assert_eq!(management["total_accounts"], json!(11));
        assert_eq!(management["total_debits"], json!(550000.0));
    }

    #[test]
    fn test_balance_sheet_reports() {
        let bs = BalanceSheet::from_model_value(json!({
            "assets": {"current_assets": "2,00,000", "fixed_assets": 300000},
            "liabilities": {"current_liabilities": 100000, "loans": 150000, "long_term_liabilities": 150000},
            "equity": {"share_capital": 200000, "retained_earnings": 50000}
        }))
        .unwrap();
        let plan = balance_sheet(&bs);

        let solvency = report(&plan, "solvency_liquidity_summary");
        assert_eq!(solvency["current_ratio"], json!(2.0));
        assert_eq!(solvency["debt_to_equity"], json!(0.6));

        let position = report(&plan, "financial_position_report");
        assert_eq!(position["equation"]["is_balanced"], json!(true));
        assert_eq!(position["assets"]["non_current"], json!(300000.0));

        let schedules = report(&plan, "asset_liability_schedules");
        assert_eq!(schedules["assets"]["total"], json!(500000.0));
        assert_eq!(schedules["assets"]["fixed_assets"], json!(300000.0));
    }

    #[test]
    fn test_profit_loss_split() {
        let pl = ProfitLoss::from_model_value(json!({
            "revenue": {"sales": 900000, "other_income": 100000},
            "expenses": {"cost_of_goods_sold": 500000, "operating_expenses": 200000, "financial_expenses": 40000}
        }))
        .unwrap();
        let plan = profit_loss(&pl);
        let split = report(&plan, "operating_vs_non_operating_split");
        assert_eq!(split["operating"]["revenue"], json!(900000.0));
        assert_eq!(split["operating"]["profit"], json!(200000.0));
        assert_eq!(split["non_operating"]["net"], json!(60000.0));

        let kpis = report(&plan, "margin_kpis");
        assert_eq!(kpis["operating_margin"], json!(20.0));
    }
}
