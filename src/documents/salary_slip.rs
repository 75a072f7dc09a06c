use super::{lenient_section, FinancialDocument};
use crate::metrics::{present_amounts, CategoryAmount, DerivedMetrics};
use crate::normalize::{lenient_number, lenient_string};
use crate::schema::DocumentType;
use crate::utils::{difference, percentage, ratio, round2, sum_present};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SalarySlip {
    #[serde(default, deserialize_with = "lenient_section")]
    pub employee: Employee,
    #[serde(default, deserialize_with = "lenient_section")]
    pub employer: Employer,
    #[serde(default, deserialize_with = "lenient_section")]
    pub salary_period: SalaryPeriod,
    #[serde(default, deserialize_with = "lenient_section")]
    pub earnings: Earnings,
    #[serde(default, deserialize_with = "lenient_section")]
    pub deductions: Deductions,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_salary: Option<f64>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub year_to_date: YearToDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Employee {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub employee_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub designation: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uan: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pan: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(description = "Masked Aadhaar number as printed")]
    pub aadhaar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Employer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pf_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub esi_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SalaryPeriod {
    #[serde(default, deserialize_with = "lenient_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub days_paid: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub working_days: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Earnings {
    #[serde(default, deserialize_with = "lenient_number")]
    pub basic_pay: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub hra: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub conveyance_allowance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub medical_allowance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub special_allowance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bonus: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub overtime: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub other_allowances: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_earnings: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub gross_salary: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Deductions {
    #[serde(default, deserialize_with = "lenient_number")]
    pub provident_fund: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub professional_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[schemars(description = "TDS on salary")]
    pub income_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub esi: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub loan_deduction: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub other_deductions: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_deductions: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct YearToDate {
    #[serde(default, deserialize_with = "lenient_number")]
    pub gross_ytd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub deductions_ytd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_ytd: Option<f64>,
}

impl SalarySlip {
    pub fn earning_heads(&self) -> Vec<CategoryAmount> {
        let e = &self.earnings;
        present_amounts(&[
            ("Basic Pay", e.basic_pay),
            ("HRA", e.hra),
            ("Conveyance Allowance", e.conveyance_allowance),
            ("Medical Allowance", e.medical_allowance),
            ("Special Allowance", e.special_allowance),
            ("Bonus", e.bonus),
            ("Overtime", e.overtime),
            ("Other Allowances", e.other_allowances),
        ])
    }

    pub fn deduction_heads(&self) -> Vec<CategoryAmount> {
        let d = &self.deductions;
        present_amounts(&[
            ("Provident Fund", d.provident_fund),
            ("Professional Tax", d.professional_tax),
            ("Income Tax", d.income_tax),
            ("ESI", d.esi),
            ("Loan Deduction", d.loan_deduction),
            ("Other Deductions", d.other_deductions),
        ])
    }

    /// Allowances only, excluding basic pay.
    pub fn total_allowances(&self) -> Option<f64> {
        let e = &self.earnings;
        sum_present([
            e.hra,
            e.conveyance_allowance,
            e.medical_allowance,
            e.special_allowance,
            e.other_allowances,
        ])
    }

    pub fn gross_salary(&self) -> Option<f64> {
        let e = &self.earnings;
        e.gross_salary
            .or(e.total_earnings)
            .or_else(|| sum_present(self.earning_heads().iter().map(|h| Some(h.amount))))
    }

    pub fn total_deductions(&self) -> Option<f64> {
        self.deductions
            .total_deductions
            .or_else(|| sum_present(self.deduction_heads().iter().map(|h| Some(h.amount))))
    }

    pub fn net_salary(&self) -> Option<f64> {
        self.net_salary.or_else(|| {
            let gross = self.gross_salary()?;
            difference(Some(gross), Some(self.total_deductions().unwrap_or(0.0)))
        })
    }

    pub fn annual_ctc(&self) -> Option<f64> {
        self.gross_salary().map(|g| round2(g * 12.0))
    }

    pub fn employee_name(&self) -> &str {
        self.employee.name.as_deref().unwrap_or("Employee")
    }
}

impl FinancialDocument for SalarySlip {
    const DOCUMENT_TYPE: DocumentType = DocumentType::SalarySlip;

    fn extraction_rules() -> &'static str {
        r#"- Copy every earning and deduction head into its matching field; put unmatched heads in `other_allowances` / `other_deductions`.
- `gross_salary` is total earnings before deductions; `net_salary` is the take-home amount.
- Month and year come from the pay period, not the print date.
- Year-to-date figures are null unless the slip prints them."#
    }

    fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics::builder()
            .chart("earnings_breakdown", self.earning_heads())
            .chart("deductions_breakdown", self.deduction_heads())
            .table(
                "take_home",
                present_amounts(&[
                    ("Gross Salary", self.gross_salary()),
                    ("Total Deductions", self.total_deductions()),
                    ("Net Salary", self.net_salary()),
                ]),
            )
            .ratio(
                "deduction_ratio",
                percentage(self.total_deductions(), self.gross_salary()),
            )
            .ratio(
                "allowance_to_basic",
                ratio(self.total_allowances(), self.earnings.basic_pay),
            )
            .ratio("monthly_ctc", self.gross_salary())
            .ratio("annual_ctc", self.annual_ctc())
            .requires_multiple_documents(false)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_totals_from_heads() {
        let slip = SalarySlip::from_model_value(json!({
            "employee": {"name": "A. Kumar", "employee_id": 1042},
            "salary_period": {"month": "March", "year": 2024},
            "earnings": {"basic_pay": "30,000", "hra": "12,000", "special_allowance": "8,000"},
            "deductions": {"provident_fund": "3,600", "professional_tax": 200, "income_tax": "2,200"}
        }))
        .unwrap();

        assert_eq!(slip.employee.employee_id.as_deref(), Some("1042"));
        assert_eq!(slip.salary_period.year.as_deref(), Some("2024"));
        assert_eq!(slip.gross_salary(), Some(50000.0));
        assert_eq!(slip.total_deductions(), Some(6000.0));
        assert_eq!(slip.net_salary(), Some(44000.0));
        assert_eq!(slip.annual_ctc(), Some(600000.0));

        let metrics = slip.metrics();
        assert_eq!(metrics.ratio("deduction_ratio"), Some(12.0));
        assert_eq!(metrics.ratio("allowance_to_basic"), Some(0.67));
    }

    #[test]
    fn test_stated_net_salary_wins() {
        let slip = SalarySlip::from_model_value(json!({
            "earnings": {"gross_salary": 1000},
            "net_salary": "₹ 900"
        }))
        .unwrap();
        assert_eq!(slip.net_salary(), Some(900.0));
        assert_eq!(slip.total_deductions(), None);
    }
}
