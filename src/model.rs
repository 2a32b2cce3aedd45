use std::fmt;

use serde::{Deserialize, Serialize};

/// Laboratory test failures as the invoicing export reports them: either a
/// plain count or the analyte description some sheets carry instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestsFailed {
    Count(u32),
    Description(String),
}

impl TestsFailed {
    pub fn count(&self) -> Option<u32> {
        match self {
            Self::Count(count) => Some(*count),
            Self::Description(_) => None,
        }
    }
}

impl Default for TestsFailed {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl fmt::Display for TestsFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Description(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalRecord {
    pub id: Option<i64>,
    pub metrc_tag: String,
    pub metrc_tag_full: String,
    pub apex_invoice_note: String,
    pub invoice_to: String,
    pub customer: String,
    pub invoice_weight: f64,
    pub invoice_number: String,
    pub paid_date: String,
    pub tests_failed: TestsFailed,
    pub lab: String,
    pub compliance_status: String,
    pub date_created: String,
    pub date_updated: String,
}

impl CanonicalRecord {
    pub fn is_paid(&self) -> bool {
        !self.paid_date.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordFilters {
    pub customer: Option<String>,
    pub metrc_tag: Option<String>,
    pub compliance_status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Partial update applied by `records update`. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordPatch {
    pub metrc_tag: Option<String>,
    pub metrc_tag_full: Option<String>,
    pub apex_invoice_note: Option<String>,
    pub invoice_to: Option<String>,
    pub customer: Option<String>,
    pub invoice_weight: Option<f64>,
    pub invoice_number: Option<String>,
    pub paid_date: Option<String>,
    pub tests_failed: Option<TestsFailed>,
    pub lab: Option<String>,
    pub compliance_status: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.metrc_tag.is_none()
            && self.metrc_tag_full.is_none()
            && self.apex_invoice_note.is_none()
            && self.invoice_to.is_none()
            && self.customer.is_none()
            && self.invoice_weight.is_none()
            && self.invoice_number.is_none()
            && self.paid_date.is_none()
            && self.tests_failed.is_none()
            && self.lab.is_none()
            && self.compliance_status.is_none()
    }

    pub fn apply_to(&self, record: &mut CanonicalRecord) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut record.metrc_tag, &self.metrc_tag);
        set(&mut record.metrc_tag_full, &self.metrc_tag_full);
        set(&mut record.apex_invoice_note, &self.apex_invoice_note);
        set(&mut record.invoice_to, &self.invoice_to);
        set(&mut record.customer, &self.customer);
        set(&mut record.invoice_weight, &self.invoice_weight);
        set(&mut record.invoice_number, &self.invoice_number);
        set(&mut record.paid_date, &self.paid_date);
        set(&mut record.tests_failed, &self.tests_failed);
        set(&mut record.lab, &self.lab);
        set(&mut record.compliance_status, &self.compliance_status);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordStats {
    pub total: i64,
    pub pending: i64,
    pub passed: i64,
    pub paid: i64,
    pub unpaid: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Accepted { record: CanonicalRecord },
    Rejected { reason: String },
}

/// One walked worksheet row. `row` is the 1-based spreadsheet row number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowEntry {
    pub row: usize,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCoercionFailure {
    pub row: usize,
    pub field: &'static str,
    pub raw_value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub entries: Vec<RowEntry>,
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub truncated: bool,
    pub coercion_failures: Vec<FieldCoercionFailure>,
    pub header_warnings: Vec<String>,
}

impl ImportResult {
    pub fn accepted_records(&self) -> impl Iterator<Item = (usize, &CanonicalRecord)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            RowOutcome::Accepted { record } => Some((entry.row, record)),
            RowOutcome::Rejected { .. } => None,
        })
    }

    pub fn rejected_rows(&self) -> Vec<RejectedRow> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                RowOutcome::Rejected { reason } => Some(RejectedRow {
                    row: entry.row,
                    reason: reason.clone(),
                }),
                RowOutcome::Accepted { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub truncated: bool,
    pub warnings: Vec<String>,
}

/// Payload handed back to the caller of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub accepted: Vec<CanonicalRecord>,
    pub rejected: Vec<RejectedRow>,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadEntry {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub sha256: String,
    pub sheet_name: String,
    pub rows_accepted: i64,
    pub records_imported: i64,
    pub records_failed: i64,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileImportOutcome {
    pub path: String,
    pub status: String,
    pub sheet_name: Option<String>,
    pub sha256: Option<String>,
    pub failure_reason: Option<String>,
    pub report: Option<ImportReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub db_path: String,
    pub column_layout_version: String,
    pub files: Vec<FileImportOutcome>,
}
