use anyhow::{Context, Result, bail};
use rusqlite::Connection;

use super::DB_SCHEMA_VERSION;
use crate::util::now_utc_string;

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    // In-memory databases answer "memory" instead of "wal".
    connection
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          metrc_tag TEXT NOT NULL DEFAULT '',
          metrc_tag_full TEXT,
          invoice_to TEXT,
          customer TEXT NOT NULL,
          invoice_weight REAL DEFAULT 0,
          invoice_number TEXT,
          paid_date TEXT,
          tests_failed INTEGER DEFAULT 0,
          lab TEXT,
          compliance_status TEXT,
          apex_invoice_note TEXT,
          date_created TEXT NOT NULL,
          date_updated TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS uploads (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          filename TEXT NOT NULL,
          file_path TEXT NOT NULL,
          file_size INTEGER NOT NULL,
          sha256 TEXT NOT NULL,
          sheet_name TEXT NOT NULL,
          rows_accepted INTEGER DEFAULT 0,
          records_imported INTEGER DEFAULT 0,
          records_failed INTEGER DEFAULT 0,
          uploaded_at TEXT NOT NULL
        );
        ",
        )
        .context("failed to create base tables")?;

    ensure_column_exists(connection, "records", "tests_failed_note TEXT")?;

    connection.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_records_metrc_tag ON records(metrc_tag);
        CREATE INDEX IF NOT EXISTS idx_records_customer ON records(customer);
        CREATE INDEX IF NOT EXISTS idx_records_date_created ON records(date_created);
        CREATE INDEX IF NOT EXISTS idx_records_compliance_status ON records(compliance_status);
        CREATE INDEX IF NOT EXISTS idx_uploads_uploaded_at ON uploads(uploaded_at);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

/// Adds `column_definition` to `table_name` unless a column of that name exists.
fn ensure_column_exists(
    connection: &Connection,
    table_name: &str,
    column_definition: &str,
) -> Result<()> {
    let Some(column_name) = column_definition.split_whitespace().next() else {
        bail!("invalid column definition: {column_definition}");
    };

    let pragma_sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            return Ok(());
        }
    }

    let alter_sql = format!("ALTER TABLE {table_name} ADD COLUMN {column_definition}");
    connection
        .execute(&alter_sql, [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;

    Ok(())
}
