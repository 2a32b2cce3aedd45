use std::path::PathBuf;

use rusqlite::ErrorCode;

/// Sheet-level failures. Any of these aborts the import of one file before a
/// single row is walked.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read workbook {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("no usable worksheet in {path}{}", .sheet.as_deref().map(|name| format!(" (requested `{name}`)")).unwrap_or_default())]
    NoWorksheet { path: PathBuf, sheet: Option<String> },

    #[error("unsupported file type for {path}: only xlsx, xlsm, xls, xlsb, ods and csv are accepted")]
    UnsupportedFormat { path: PathBuf },

    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("header row does not match the expected column layout: {}", .mismatches.join("; "))]
    HeaderMismatch { mismatches: Vec<String> },
}

/// A failure confined to one worksheet row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("{field} cell holds spreadsheet error {value}")]
    CellError { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    /// Lock, disk and permission failures are reported as the store being
    /// unavailable; everything else stays a plain sqlite error.
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
                | ErrorCode::CannotOpen,
            ) => Self::Unavailable(err.to_string()),
            _ => Self::Sqlite(err),
        }
    }
}
