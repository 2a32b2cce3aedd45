use std::io::{self, Write};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{DeleteArgs, ListArgs, RecordsCommand, ShowArgs, UpdateArgs};
use crate::commands::import::parse_tests_failed;
use crate::model::{CanonicalRecord, RecordFilters, RecordPatch};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::util::write_json_stdout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOpResult {
    pub id: i64,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<RecordOpResult>,
}

pub fn run(command: RecordsCommand) -> Result<()> {
    match command {
        RecordsCommand::List(args) => list(args),
        RecordsCommand::Show(args) => show(args),
        RecordsCommand::Update(args) => update(args),
        RecordsCommand::Delete(args) => delete(args),
    }
}

fn list(args: ListArgs) -> Result<()> {
    let store = SqliteRecordStore::open(&args.store.db_path)?;
    let filters = RecordFilters::from(args.filters);
    let records = store.find_all(&filters)?;
    info!(count = records.len(), "listed records");

    if args.json {
        return write_json_stdout(&records);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Records: {}", records.len())?;
    for record in &records {
        write_record_line(&mut output, record)?;
    }
    output.flush()?;
    Ok(())
}

fn show(args: ShowArgs) -> Result<()> {
    let store = SqliteRecordStore::open(&args.store.db_path)?;
    let Some(record) = store.find_by_id(args.id)? else {
        bail!("record {} not found", args.id);
    };

    if args.json {
        return write_json_stdout(&record);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    let fields = [
        ("id", args.id.to_string()),
        ("metrc_tag", record.metrc_tag.clone()),
        ("metrc_tag_full", record.metrc_tag_full.clone()),
        ("customer", record.customer.clone()),
        ("invoice_to", record.invoice_to.clone()),
        ("invoice_weight", record.invoice_weight.to_string()),
        ("invoice_number", record.invoice_number.clone()),
        ("paid_date", record.paid_date.clone()),
        ("tests_failed", record.tests_failed.to_string()),
        ("lab", record.lab.clone()),
        ("compliance_status", record.compliance_status.clone()),
        ("apex_invoice_note", record.apex_invoice_note.clone()),
        ("date_created", record.date_created.clone()),
        ("date_updated", record.date_updated.clone()),
    ];
    for (name, value) in fields {
        writeln!(output, "{name:<18}{value}")?;
    }
    output.flush()?;
    Ok(())
}

fn update(args: UpdateArgs) -> Result<()> {
    let patch = patch_from_args(&args);
    if patch.is_empty() {
        bail!("nothing to update: pass at least one field flag such as --paid-date");
    }

    let mut store = SqliteRecordStore::open(&args.store.db_path)?;
    let summary = update_records(&mut store, &args.ids, &patch);
    report_bulk(&summary, "updated", args.json)?;

    if summary.failed > 0 {
        bail!(
            "{} of {} record(s) could not be updated",
            summary.failed,
            summary.total
        );
    }
    Ok(())
}

fn delete(args: DeleteArgs) -> Result<()> {
    let mut store = SqliteRecordStore::open(&args.store.db_path)?;
    let summary = delete_records(&mut store, &args.ids);
    report_bulk(&summary, "deleted", args.json)?;

    if summary.failed > 0 {
        bail!(
            "{} of {} record(s) could not be deleted",
            summary.failed,
            summary.total
        );
    }
    Ok(())
}

fn patch_from_args(args: &UpdateArgs) -> RecordPatch {
    RecordPatch {
        metrc_tag: args.metrc_tag.as_ref().map(|tag| tag.trim().to_string()),
        metrc_tag_full: args.metrc_tag_full.clone(),
        apex_invoice_note: args.apex_invoice_note.clone(),
        invoice_to: args.invoice_to.clone(),
        customer: args.customer.clone(),
        invoice_weight: args.invoice_weight,
        invoice_number: args.invoice_number.clone(),
        paid_date: args.paid_date.as_ref().map(|date| date.trim().to_string()),
        tests_failed: args.tests_failed.as_deref().map(parse_tests_failed),
        lab: args.lab.clone(),
        compliance_status: args.compliance_status.clone(),
    }
}

/// Applies `patch` to each id in turn; one failure does not stop the rest.
pub fn update_records<R: RecordStore + ?Sized>(
    store: &mut R,
    ids: &[i64],
    patch: &RecordPatch,
) -> BulkSummary {
    bulk(ids, |id| store.update(id, patch), "updated")
}

pub fn delete_records<R: RecordStore + ?Sized>(store: &mut R, ids: &[i64]) -> BulkSummary {
    bulk(ids, |id| store.delete(id), "deleted")
}

fn bulk<F>(ids: &[i64], mut op: F, done: &str) -> BulkSummary
where
    F: FnMut(i64) -> Result<bool, crate::error::StoreError>,
{
    let results: Vec<RecordOpResult> = ids
        .iter()
        .map(|&id| match op(id) {
            Ok(true) => RecordOpResult {
                id,
                status: done.to_string(),
                error: None,
            },
            Ok(false) => RecordOpResult {
                id,
                status: "failed".to_string(),
                error: Some("record not found".to_string()),
            },
            Err(err) => {
                warn!(id, error = %err, "record operation failed");
                RecordOpResult {
                    id,
                    status: "failed".to_string(),
                    error: Some(err.to_string()),
                }
            }
        })
        .collect();

    let succeeded = results.iter().filter(|result| result.error.is_none()).count();
    BulkSummary {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    }
}

fn report_bulk(summary: &BulkSummary, verb: &str, json: bool) -> Result<()> {
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "{verb} records"
    );

    if json {
        return write_json_stdout(summary);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for result in &summary.results {
        match &result.error {
            None => writeln!(output, "{}\t{}", result.id, result.status)?,
            Some(error) => writeln!(output, "{}\t{}\t{}", result.id, result.status, error)?,
        }
    }
    writeln!(
        output,
        "total={} {verb}={} failed={}",
        summary.total, summary.succeeded, summary.failed
    )?;
    output.flush()?;
    Ok(())
}

fn write_record_line(output: &mut impl Write, record: &CanonicalRecord) -> Result<()> {
    let tag = if record.metrc_tag.is_empty() {
        "(untagged)"
    } else {
        &record.metrc_tag
    };

    writeln!(
        output,
        "{}\t{}\t{}\t{}\t{} lbs\tfailed={}\t{}\t{}",
        record.id.unwrap_or_default(),
        record.date_created,
        tag,
        record.customer,
        record.invoice_weight,
        record.tests_failed,
        if record.is_paid() { "paid" } else { "unpaid" },
        record.compliance_status,
    )?;
    Ok(())
}
