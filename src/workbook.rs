//! Spreadsheet input for the GST compliance audit.
//!
//! The OCR layer hands spreadsheets over as `{sheet_name: {columns, rows}}`.
//! This module names the file kinds the audit understands and renders the
//! sheets row by row into prompt text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const GSTR2B_SUMMARY: &str = "gstr2b_summary";
pub const PURCHASE_REGISTER: &str = "purchase_register";
pub const VENDOR_MASTER: &str = "vendor_master";
pub const UNKNOWN_WORKBOOK: &str = "unknown";

/// One sheet: column headers in order plus one object per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcelSheet {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, alias = "data")]
    pub rows: Vec<Map<String, Value>>,
}

/// All sheets of one spreadsheet file, keyed by sheet name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcelWorkbook {
    pub sheets: BTreeMap<String, ExcelSheet>,
}

impl ExcelSheet {
    /// Non-empty cells of `row` as `(column, text)`, header order first,
    /// then any cells under columns the header does not list.
    fn cells<'a>(&'a self, row: &'a Map<String, Value>) -> Vec<(&'a str, String)> {
        let listed = self.columns.iter().map(String::as_str);
        let extra = row
            .keys()
            .map(String::as_str)
            .filter(|key| !self.columns.iter().any(|c| c == key));

        listed
            .chain(extra)
            .filter_map(|column| {
                let text = cell_text(row.get(column)?)?;
                Some((column, text))
            })
            .collect()
    }
}

impl ExcelWorkbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    /// Short description listing every sheet and its rows, cells joined by
    /// `", "`.
    pub fn summary_text(&self) -> String {
        let mut text = format!("Excel file with {} sheet(s):\n", self.sheets.len());
        for (name, sheet) in &self.sheets {
            text.push_str(&format!("\nSheet: {}\n", name));
            text.push_str(&format!("Columns: {}\n", sheet.columns.join(", ")));
            text.push_str(&format!("Total Rows: {}\n", sheet.rows.len()));
            if !sheet.rows.is_empty() {
                text.push_str(&format!("\nAll Data ({} rows):\n", sheet.rows.len()));
                for (index, row) in sheet.rows.iter().enumerate() {
                    text.push_str(&format!("  Row {}: {}\n", index + 1, join_cells(&sheet.cells(row), ", ")));
                }
            }
        }
        text
    }

    /// Full row-by-row listing under a banner naming `file_type`, cells
    /// joined by `" | "`.
    pub fn data_text(&self, file_type: &str) -> String {
        let rule = "=".repeat(60);
        let mut text = format!("\n\n{}\n{} - COMPLETE DATA\n{}\n", rule, file_type.to_uppercase(), rule);
        for (name, sheet) in &self.sheets {
            text.push_str(&format!("\nSheet: {}\n", name));
            text.push_str(&format!("Columns: {}\n", sheet.columns.join(", ")));
            text.push_str(&format!("Total Rows: {}\n\n", sheet.rows.len()));
            for (index, row) in sheet.rows.iter().enumerate() {
                text.push_str(&format!("Row {}: {}\n", index + 1, join_cells(&sheet.cells(row), " | ")));
            }
        }
        text
    }
}

/// Kind of GST spreadsheet a file name suggests: `gstr2b_summary`,
/// `purchase_register`, `vendor_master` or `unknown`.
pub fn workbook_kind(filename: &str) -> &'static str {
    let name = filename.to_lowercase();
    if name.contains("gstr") || name.contains("2b") || name.contains("summary") {
        GSTR2B_SUMMARY
    } else if name.contains("purchase") || name.contains("register") {
        PURCHASE_REGISTER
    } else if name.contains("vendor") || name.contains("master") {
        VENDOR_MASTER
    } else {
        UNKNOWN_WORKBOOK
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn join_cells(cells: &[(&str, String)], separator: &str) -> String {
    cells
        .iter()
        .map(|(column, text)| format!("{}: {}", column, text))
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register() -> ExcelWorkbook {
        serde_json::from_value(json!({
            "Purchases": {
                "columns": ["Invoice No", "Vendor", "Taxable Value"],
                "data": [
                    {"Vendor": "MMX Foods Pvt Ltd", "Invoice No": "INV-001", "Taxable Value": 1000},
                    {"Invoice No": "INV-002", "Vendor": "", "Taxable Value": null, "Remarks": "credit note"}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_workbook_kind_from_filename() {
        assert_eq!(workbook_kind("GSTR-2B Apr.xlsx"), GSTR2B_SUMMARY);
        assert_eq!(workbook_kind("purchase_register.xlsx"), PURCHASE_REGISTER);
        assert_eq!(workbook_kind("Vendor Master.xls"), VENDOR_MASTER);
        assert_eq!(workbook_kind("notes.xlsx"), UNKNOWN_WORKBOOK);
    }

    #[test]
    fn test_rows_follow_header_order_and_skip_blanks() {
        let text = register().data_text(PURCHASE_REGISTER);
        assert!(text.contains("PURCHASE_REGISTER - COMPLETE DATA"));
        assert!(text.contains("Total Rows: 2"));
        assert!(text.contains("Row 1: Invoice No: INV-001 | Vendor: MMX Foods Pvt Ltd | Taxable Value: 1000\n"));
        assert!(text.contains("Row 2: Invoice No: INV-002 | Remarks: credit note\n"));
    }

    #[test]
    fn test_summary_text_lists_sheets() {
        let workbook = register();
        assert_eq!(workbook.sheet_names(), vec!["Purchases"]);
        let summary = workbook.summary_text();
        assert!(summary.starts_with("Excel file with 1 sheet(s):\n"));
        assert!(summary.contains("Columns: Invoice No, Vendor, Taxable Value"));
        assert!(summary.contains("  Row 1: Invoice No: INV-001, Vendor: MMX Foods Pvt Ltd, Taxable Value: 1000\n"));
    }
}
