use crate::model::TestsFailed;
use crate::workbook::{Cell, Worksheet};

use super::cell_access::get_cell_text;

/// Layout of the Apex invoicing export this table describes. Bump it together
/// with `COLUMN_MAP` when the producer moves columns.
pub const COLUMN_LAYOUT_VERSION: &str = "apex-invoice-v1";

pub const HEADER_ROW: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MetrcComposite,
    InvoiceTo,
    Customer,
    InvoiceWeight,
    InvoiceNumber,
    PaidDate,
    TestsFailed,
    Lab,
    ComplianceStatus,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Self::MetrcComposite => "metrc_tag_full",
            Self::InvoiceTo => "invoice_to",
            Self::Customer => "customer",
            Self::InvoiceWeight => "invoice_weight",
            Self::InvoiceNumber => "invoice_number",
            Self::PaidDate => "paid_date",
            Self::TestsFailed => "tests_failed",
            Self::Lab => "lab",
            Self::ComplianceStatus => "compliance_status",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub index: usize,
    pub field: Field,
    /// Lowercase fragments any one of which the header cell should contain.
    pub header_hints: &'static [&'static str],
}

pub const COLUMN_MAP: [ColumnSpec; 9] = [
    ColumnSpec {
        index: 0,
        field: Field::MetrcComposite,
        header_hints: &["metrc", "tag", "package", "item"],
    },
    ColumnSpec {
        index: 1,
        field: Field::InvoiceTo,
        header_hints: &["invoice to", "bill"],
    },
    ColumnSpec {
        index: 2,
        field: Field::Customer,
        header_hints: &["customer", "client"],
    },
    ColumnSpec {
        index: 7,
        field: Field::InvoiceWeight,
        header_hints: &["weight", "lbs"],
    },
    ColumnSpec {
        index: 9,
        field: Field::InvoiceNumber,
        header_hints: &["invoice", "number", "#"],
    },
    ColumnSpec {
        index: 10,
        field: Field::PaidDate,
        header_hints: &["paid", "date"],
    },
    ColumnSpec {
        index: 11,
        field: Field::TestsFailed,
        header_hints: &["fail", "test"],
    },
    ColumnSpec {
        index: 12,
        field: Field::Lab,
        header_hints: &["lab"],
    },
    ColumnSpec {
        index: 22,
        field: Field::ComplianceStatus,
        header_hints: &["compliance", "status"],
    },
];

pub const COMPOSITE_COLUMN: usize = 0;
pub const CUSTOMER_COLUMN: usize = 2;

/// Spreadsheet column letter for a zero-based index (`0` → `A`, `22` → `W`).
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Compares the header row with the expected labels. Returns one message per
/// mapped column whose header is present but unrecognized; a blank header row
/// is not checked.
pub fn check_header_row<S: Worksheet + ?Sized>(sheet: &S) -> Vec<String> {
    let headers: Vec<(ColumnSpec, String)> = COLUMN_MAP
        .iter()
        .map(|spec| {
            let text = get_cell_text(Some(sheet), HEADER_ROW, spec.index);
            (*spec, text.trim().to_lowercase())
        })
        .collect();

    if headers.iter().all(|(_, text)| text.is_empty()) {
        return Vec::new();
    }

    headers
        .into_iter()
        .filter(|(spec, text)| {
            !text.is_empty() && !spec.header_hints.iter().any(|hint| text.contains(hint))
        })
        .map(|(spec, text)| {
            format!(
                "column {} ({}) has header `{}`, expected one of {:?}",
                column_letter(spec.index),
                spec.field.name(),
                text,
                spec.header_hints
            )
        })
        .collect()
}

pub fn coerce_text(cell: Option<&Cell>) -> Result<String, String> {
    match cell {
        None => Ok(String::new()),
        Some(Cell::Error(code)) => Err(format!("cell holds spreadsheet error {code}")),
        Some(cell) => Ok(cell.display_text().trim().to_string()),
    }
}

/// Pounds. Text follows leading-number parsing (`"12.5 lbs"` reads as 12.5).
pub fn coerce_weight(cell: Option<&Cell>) -> Result<f64, String> {
    let value = match cell {
        None => return Ok(0.0),
        Some(Cell::Number(value)) => *value,
        Some(Cell::Int(value)) => *value as f64,
        Some(Cell::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            leading_number(trimmed).ok_or_else(|| format!("`{trimmed}` is not a number"))?
        }
        Some(other) => return Err(format!("`{}` is not a number", other.display_text())),
    };

    if !value.is_finite() || value < 0.0 {
        return Err(format!("{value} is not a non-negative weight"));
    }
    Ok(value)
}

/// Blank reads as no failures; a whole count becomes `Count`, any other text
/// is kept verbatim as `Description`.
pub fn coerce_tests_failed(cell: Option<&Cell>) -> Result<TestsFailed, String> {
    match cell {
        None => Ok(TestsFailed::Count(0)),
        Some(Cell::Error(code)) => Err(format!("cell holds spreadsheet error {code}")),
        Some(Cell::Int(value)) => Ok(u32::try_from(*value)
            .map(TestsFailed::Count)
            .unwrap_or_else(|_| TestsFailed::Description(value.to_string()))),
        Some(Cell::Number(value))
            if value.fract() == 0.0 && *value >= 0.0 && *value <= f64::from(u32::MAX) =>
        {
            Ok(TestsFailed::Count(*value as u32))
        }
        Some(cell) => Ok(parse_tests_failed(&cell.display_text())),
    }
}

pub fn parse_tests_failed(raw: &str) -> TestsFailed {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return TestsFailed::Count(0);
    }
    trimmed
        .parse::<u32>()
        .map(TestsFailed::Count)
        .unwrap_or_else(|_| TestsFailed::Description(trimmed.to_string()))
}

/// Longest numeric prefix of `text`, ignoring thousands separators.
pub(crate) fn leading_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|ch| *ch != ',').collect();
    let bytes = cleaned.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    cleaned[..end].parse().ok()
}
