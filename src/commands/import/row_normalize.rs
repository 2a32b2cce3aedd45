use tracing::warn;

use crate::error::RowError;
use crate::model::{CanonicalRecord, FieldCoercionFailure};
use crate::workbook::{Cell, Worksheet};

use super::cell_access::get_cell;
use super::column_map::{
    COLUMN_MAP, Field, coerce_tests_failed, coerce_text, coerce_weight,
};
use super::composite::CompositeParser;

#[derive(Debug, Default)]
pub struct RowNormalization {
    /// `None` when the row carries no customer.
    pub record: Option<CanonicalRecord>,
    pub coercion_failures: Vec<FieldCoercionFailure>,
}

pub struct RowNormalizer<'a> {
    parser: &'a CompositeParser,
    today: String,
}

impl<'a> RowNormalizer<'a> {
    /// `today` is the date-only stamp written to `date_created` and `date_updated`.
    pub fn new(parser: &'a CompositeParser, today: impl Into<String>) -> Self {
        Self {
            parser,
            today: today.into(),
        }
    }

    /// Builds the canonical record for zero-based `row_index`. Fields that fail
    /// coercion fall back to their defaults; only a spreadsheet error in one of
    /// the anchor columns fails the whole row.
    pub fn normalize_row<S: Worksheet + ?Sized>(
        &self,
        sheet: &S,
        row_index: usize,
    ) -> Result<RowNormalization, RowError> {
        let sheet_row = row_index + 1;
        let mut record = CanonicalRecord::default();
        let mut coercion_failures = Vec::new();

        for spec in &COLUMN_MAP {
            let cell = get_cell(Some(sheet), row_index, spec.index);

            if let (Field::MetrcComposite | Field::Customer, Some(Cell::Error(code))) =
                (spec.field, cell)
            {
                return Err(RowError::CellError {
                    field: spec.field.name(),
                    value: code.clone(),
                });
            }

            let outcome = match spec.field {
                Field::MetrcComposite => coerce_text(cell).map(|text| {
                    let composite = self.parser.parse(&text);
                    record.metrc_tag = composite.tag;
                    record.metrc_tag_full = composite.note.clone();
                    record.apex_invoice_note = composite.note;
                }),
                Field::InvoiceTo => coerce_text(cell).map(|text| record.invoice_to = text),
                Field::Customer => coerce_text(cell).map(|text| record.customer = text),
                Field::InvoiceWeight => {
                    coerce_weight(cell).map(|weight| record.invoice_weight = weight)
                }
                Field::InvoiceNumber => {
                    coerce_text(cell).map(|text| record.invoice_number = text)
                }
                Field::PaidDate => coerce_text(cell).map(|text| record.paid_date = text),
                Field::TestsFailed => {
                    coerce_tests_failed(cell).map(|tests| record.tests_failed = tests)
                }
                Field::Lab => coerce_text(cell).map(|text| record.lab = text),
                Field::ComplianceStatus => {
                    coerce_text(cell).map(|text| record.compliance_status = text)
                }
            };

            if let Err(reason) = outcome {
                let raw_value = cell.map(Cell::display_text).unwrap_or_default();
                warn!(
                    row = sheet_row,
                    field = spec.field.name(),
                    raw_value = %raw_value,
                    reason = %reason,
                    "field coercion failed; using default"
                );
                coercion_failures.push(FieldCoercionFailure {
                    row: sheet_row,
                    field: spec.field.name(),
                    raw_value,
                    reason,
                });
            }
        }

        record.date_created = self.today.clone();
        record.date_updated = self.today.clone();

        if record.customer.trim().is_empty() {
            return Ok(RowNormalization {
                record: None,
                coercion_failures,
            });
        }

        Ok(RowNormalization {
            record: Some(record),
            coercion_failures,
        })
    }
}
