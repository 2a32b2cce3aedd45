use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::RecordStore;
use super::db_setup::{configure_connection, ensure_schema};
use crate::commands::import::is_valid_metrc_tag;
use crate::error::StoreError;
use crate::model::{
    CanonicalRecord, RecordFilters, RecordPatch, RecordStats, TestsFailed, UploadEntry,
};
use crate::util::{ensure_parent_directory, now_utc_string, parse_iso_date, today_date_string};

const RECORD_COLUMNS: &str = "id, metrc_tag, metrc_tag_full, invoice_to, customer, invoice_weight, \
     invoice_number, paid_date, tests_failed, tests_failed_note, lab, compliance_status, \
     apex_invoice_note, date_created, date_updated";

pub struct SqliteRecordStore {
    connection: Connection,
}

/// Upload-log row written once per imported file.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub sha256: String,
    pub sheet_name: String,
    pub rows_accepted: usize,
    pub records_imported: usize,
    pub records_failed: usize,
}

impl SqliteRecordStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        ensure_parent_directory(db_path)?;
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn log_upload(&self, upload: &NewUpload) -> Result<i64, StoreError> {
        self.connection.execute(
            "INSERT INTO uploads(
               filename, file_path, file_size, sha256, sheet_name,
               rows_accepted, records_imported, records_failed, uploaded_at
             )
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                upload.filename,
                upload.file_path,
                upload.file_size as i64,
                upload.sha256,
                upload.sheet_name,
                upload.rows_accepted as i64,
                upload.records_imported as i64,
                upload.records_failed as i64,
                now_utc_string(),
            ],
        )?;
        Ok(self.connection.last_insert_rowid())
    }

    pub fn list_uploads(&self, limit: usize) -> Result<Vec<UploadEntry>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT id, filename, file_path, file_size, sha256, sheet_name,
                    rows_accepted, records_imported, records_failed, uploaded_at
             FROM uploads
             ORDER BY uploaded_at DESC, id DESC
             LIMIT ?1",
        )?;

        let uploads = statement
            .query_map([limit as i64], |row| {
                Ok(UploadEntry {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    file_path: row.get(2)?,
                    file_size: row.get(3)?,
                    sha256: row.get(4)?,
                    sheet_name: row.get(5)?,
                    rows_accepted: row.get(6)?,
                    records_imported: row.get(7)?,
                    records_failed: row.get(8)?,
                    uploaded_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(uploads)
    }

    fn query_count(&self, sql: &str) -> Result<i64, StoreError> {
        let count = self.connection.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

fn validate_record(record: &CanonicalRecord) -> Result<(), StoreError> {
    if record.customer.trim().is_empty() {
        return Err(StoreError::InvalidRecord("customer is required".to_string()));
    }
    if !record.metrc_tag.is_empty() && !is_valid_metrc_tag(&record.metrc_tag) {
        return Err(StoreError::InvalidRecord(format!(
            "metrc tag `{}` is not 16 uppercase letters or digits",
            record.metrc_tag
        )));
    }
    if !record.invoice_weight.is_finite() || record.invoice_weight < 0.0 {
        return Err(StoreError::InvalidRecord(format!(
            "invoice weight {} must be a non-negative number",
            record.invoice_weight
        )));
    }
    Ok(())
}

fn tests_failed_columns(tests_failed: &TestsFailed) -> (Option<i64>, Option<&str>) {
    match tests_failed {
        TestsFailed::Count(count) => (Some(i64::from(*count)), None),
        TestsFailed::Description(text) => (None, Some(text.as_str())),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CanonicalRecord> {
    let tests_failed_count: Option<i64> = row.get(8)?;
    let tests_failed_note: Option<String> = row.get(9)?;
    let tests_failed = match tests_failed_note {
        Some(note) => TestsFailed::Description(note),
        None => TestsFailed::Count(
            tests_failed_count
                .and_then(|count| u32::try_from(count).ok())
                .unwrap_or(0),
        ),
    };

    Ok(CanonicalRecord {
        id: Some(row.get(0)?),
        metrc_tag: row.get(1)?,
        metrc_tag_full: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        invoice_to: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        customer: row.get(4)?,
        invoice_weight: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        invoice_number: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        paid_date: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        tests_failed,
        lab: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        compliance_status: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        apex_invoice_note: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        date_created: row.get(13)?,
        date_updated: row.get(14)?,
    })
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// `date_updated` for an edit made today, never earlier than `date_created`.
pub(super) fn next_date_updated(date_created: &str, today: &str) -> String {
    match (parse_iso_date(date_created), parse_iso_date(today)) {
        (Some(created), Some(now)) if now < created => date_created.to_string(),
        _ => today.to_string(),
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert(&mut self, record: &CanonicalRecord) -> Result<i64, StoreError> {
        validate_record(record)?;

        let (tests_failed, tests_failed_note) = tests_failed_columns(&record.tests_failed);
        let now = now_utc_string();
        self.connection.execute(
            "INSERT INTO records(
               metrc_tag, metrc_tag_full, invoice_to, customer, invoice_weight,
               invoice_number, paid_date, tests_failed, tests_failed_note, lab,
               compliance_status, apex_invoice_note, date_created, date_updated,
               created_at, updated_at
             )
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.metrc_tag,
                record.metrc_tag_full,
                record.invoice_to,
                record.customer,
                record.invoice_weight,
                record.invoice_number,
                record.paid_date,
                tests_failed,
                tests_failed_note,
                record.lab,
                record.compliance_status,
                record.apex_invoice_note,
                record.date_created,
                record.date_updated,
                now,
                now,
            ],
        )?;

        Ok(self.connection.last_insert_rowid())
    }

    fn find_all(&self, filters: &RecordFilters) -> Result<Vec<CanonicalRecord>, StoreError> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(customer) = filters.customer.as_deref().filter(|v| !v.is_empty()) {
            conditions.push("customer LIKE ? ESCAPE '\\'");
            values.push(like_pattern(customer));
        }
        if let Some(tag) = filters.metrc_tag.as_deref().filter(|v| !v.is_empty()) {
            conditions.push("metrc_tag LIKE ? ESCAPE '\\'");
            values.push(like_pattern(tag));
        }
        if let Some(status) = filters.compliance_status.as_deref().filter(|v| !v.is_empty()) {
            conditions.push("compliance_status = ?");
            values.push(status.to_string());
        }
        if let Some(date_from) = filters.date_from.as_deref().filter(|v| !v.is_empty()) {
            conditions.push("date_created >= ?");
            values.push(date_from.to_string());
        }
        if let Some(date_to) = filters.date_to.as_deref().filter(|v| !v.is_empty()) {
            conditions.push("date_created <= ?");
            values.push(date_to.to_string());
        }

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY date_created DESC, id DESC");

        let mut statement = self.connection.prepare(&sql)?;
        let records = statement
            .query_map(params_from_iter(values.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<CanonicalRecord>, StoreError> {
        let record = self
            .connection
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                [id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn update(&mut self, id: i64, patch: &RecordPatch) -> Result<bool, StoreError> {
        let Some(mut record) = self.find_by_id(id)? else {
            return Ok(false);
        };

        patch.apply_to(&mut record);
        validate_record(&record)?;
        record.date_updated = next_date_updated(&record.date_created, &today_date_string());

        let (tests_failed, tests_failed_note) = tests_failed_columns(&record.tests_failed);
        let changed = self.connection.execute(
            "UPDATE records SET
               metrc_tag = ?1, metrc_tag_full = ?2, invoice_to = ?3, customer = ?4,
               invoice_weight = ?5, invoice_number = ?6, paid_date = ?7, tests_failed = ?8,
               tests_failed_note = ?9, lab = ?10, compliance_status = ?11,
               apex_invoice_note = ?12, date_updated = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                record.metrc_tag,
                record.metrc_tag_full,
                record.invoice_to,
                record.customer,
                record.invoice_weight,
                record.invoice_number,
                record.paid_date,
                tests_failed,
                tests_failed_note,
                record.lab,
                record.compliance_status,
                record.apex_invoice_note,
                record.date_updated,
                now_utc_string(),
                id,
            ],
        )?;

        Ok(changed > 0)
    }

    fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .connection
            .execute("DELETE FROM records WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn stats(&self) -> Result<RecordStats, StoreError> {
        Ok(RecordStats {
            total: self.query_count("SELECT COUNT(*) FROM records")?,
            pending: self.query_count(
                "SELECT COUNT(*) FROM records
                 WHERE tests_failed = 0 AND tests_failed_note IS NULL
                   AND (paid_date IS NULL OR paid_date = '')",
            )?,
            passed: self.query_count(
                "SELECT COUNT(*) FROM records WHERE tests_failed = 0 AND tests_failed_note IS NULL",
            )?,
            paid: self.query_count(
                "SELECT COUNT(*) FROM records WHERE paid_date IS NOT NULL AND paid_date != ''",
            )?,
            unpaid: self.query_count(
                "SELECT COUNT(*) FROM records WHERE paid_date IS NULL OR paid_date = ''",
            )?,
        })
    }
}
