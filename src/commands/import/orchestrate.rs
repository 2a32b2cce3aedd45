use tracing::{info, warn};

use crate::error::ImportError;
use crate::model::{ImportReport, ImportSummary};
use crate::store::RecordStore;
use crate::workbook::Worksheet;

use super::row_normalize::RowNormalizer;
use super::sheet_walk::{WalkOptions, walk};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub walk: WalkOptions,
    /// Skip accepted rows whose METRC tag is already stored.
    pub skip_existing_tags: bool,
}

/// Walks `sheet` and inserts every accepted record into `store`, one insert
/// per record. Insert failures are counted and reported; they never undo
/// earlier inserts or stop later ones.
pub fn import_sheet<S, R>(
    sheet: &S,
    store: &mut R,
    normalizer: &RowNormalizer<'_>,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError>
where
    S: Worksheet + ?Sized,
    R: RecordStore + ?Sized,
{
    let walked = walk(sheet, normalizer, &options.walk)?;

    let mut summary = ImportSummary {
        total_rows: walked.total_rows,
        truncated: walked.truncated,
        ..ImportSummary::default()
    };
    summary.warnings.extend(walked.header_warnings.iter().cloned());
    if walked.truncated {
        summary.warnings.push(format!(
            "stopped at sheet row {}; later rows were not imported",
            options.walk.max_rows
        ));
    }
    summary
        .warnings
        .extend(walked.coercion_failures.iter().map(|failure| {
            format!(
                "row {}: {} `{}` defaulted ({})",
                failure.row, failure.field, failure.raw_value, failure.reason
            )
        }));

    let mut accepted = Vec::with_capacity(walked.accepted);
    for (row, record) in walked.accepted_records() {
        let mut record = record.clone();

        if options.skip_existing_tags && !record.metrc_tag.is_empty() {
            match store.find_by_metrc_tag(&record.metrc_tag) {
                Ok(existing) if !existing.is_empty() => {
                    info!(row, metrc_tag = %record.metrc_tag, "tag already stored; skipping");
                    summary.skipped += 1;
                    summary.warnings.push(format!(
                        "row {row}: METRC tag {} already stored",
                        record.metrc_tag
                    ));
                    accepted.push(record);
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(row, error = %err, "duplicate lookup failed");
                    summary.failed += 1;
                    summary.errors.push(format!("row {row}: {err}"));
                    accepted.push(record);
                    continue;
                }
            }
        }

        match store.insert(&record) {
            Ok(id) => {
                record.id = Some(id);
                summary.successful += 1;
            }
            Err(err) => {
                warn!(row, error = %err, "failed to store record");
                summary.failed += 1;
                summary.errors.push(format!("row {row}: {err}"));
            }
        }
        accepted.push(record);
    }

    info!(
        total_rows = summary.total_rows,
        successful = summary.successful,
        failed = summary.failed,
        skipped = summary.skipped,
        rejected = walked.rejected,
        "import finished"
    );

    Ok(ImportReport {
        accepted,
        rejected: walked.rejected_rows(),
        summary,
    })
}
