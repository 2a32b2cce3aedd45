use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::model::{ImportResult, RowEntry, RowOutcome};
use crate::workbook::Worksheet;

use super::cell_access::get_cell_text;
use super::column_map::{COMPOSITE_COLUMN, CUSTOMER_COLUMN, check_header_row};
use super::row_normalize::RowNormalizer;

/// Zero-based index of the first data row (sheet row 2, below the header).
pub const FIRST_DATA_ROW: usize = 1;

/// Last 1-based sheet row the walker will look at.
pub const MAX_SHEET_ROWS: usize = 10_000;

pub const MISSING_CUSTOMER_REASON: &str = "missing customer";

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    pub max_rows: usize,
    pub strict_headers: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_rows: MAX_SHEET_ROWS,
            strict_headers: false,
        }
    }
}

fn has_anchor<S: Worksheet + ?Sized>(sheet: &S, row_index: usize) -> bool {
    !get_cell_text(Some(sheet), row_index, COMPOSITE_COLUMN).is_empty()
        || !get_cell_text(Some(sheet), row_index, CUSTOMER_COLUMN).is_empty()
}

/// Walks data rows until both anchor cells are empty or the row ceiling is
/// reached. Row failures are recorded as rejections and never stop the walk.
pub fn walk<S: Worksheet + ?Sized>(
    sheet: &S,
    normalizer: &RowNormalizer<'_>,
    options: &WalkOptions,
) -> Result<ImportResult, ImportError> {
    let mut result = ImportResult {
        header_warnings: check_header_row(sheet),
        ..ImportResult::default()
    };

    if !result.header_warnings.is_empty() {
        if options.strict_headers {
            return Err(ImportError::HeaderMismatch {
                mismatches: result.header_warnings,
            });
        }
        for message in &result.header_warnings {
            warn!(message = %message, "header row differs from expected layout");
        }
    }

    if sheet.bounds().is_none() {
        info!("worksheet is empty");
        return Ok(result);
    }

    let mut row_index = FIRST_DATA_ROW;
    loop {
        if row_index >= options.max_rows {
            if has_anchor(sheet, row_index) {
                result.truncated = true;
                warn!(
                    max_rows = options.max_rows,
                    "reached maximum row limit; remaining rows were not imported"
                );
            }
            break;
        }

        if !has_anchor(sheet, row_index) {
            debug!(row = row_index + 1, "end of data");
            break;
        }

        let sheet_row = row_index + 1;
        let outcome = match normalizer.normalize_row(sheet, row_index) {
            Ok(normalized) => {
                result.coercion_failures.extend(normalized.coercion_failures);
                match normalized.record {
                    Some(record) => RowOutcome::Accepted { record },
                    None => RowOutcome::Rejected {
                        reason: MISSING_CUSTOMER_REASON.to_string(),
                    },
                }
            }
            Err(err) => RowOutcome::Rejected {
                reason: err.to_string(),
            },
        };

        match &outcome {
            RowOutcome::Accepted { .. } => result.accepted += 1,
            RowOutcome::Rejected { reason } => {
                info!(row = sheet_row, reason = %reason, "row rejected");
                result.rejected += 1;
            }
        }
        result.entries.push(RowEntry {
            row: sheet_row,
            outcome,
        });

        row_index += 1;
    }

    result.total_rows = result.entries.len();
    Ok(result)
}
