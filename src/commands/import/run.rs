use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cli::ImportArgs;
use crate::model::{FileImportOutcome, ImportRunManifest};
use crate::store::{NewUpload, SqliteRecordStore};
use crate::util::{
    now_utc_string, sha256_file, today_date_string, write_json_pretty, write_json_stdout,
};
use crate::workbook::{is_spreadsheet_path, load_worksheet};

use super::column_map::COLUMN_LAYOUT_VERSION;
use super::composite::CompositeParser;
use super::orchestrate::{ImportOptions, import_sheet};
use super::row_normalize::RowNormalizer;
use super::sheet_walk::WalkOptions;

const MAX_REPORTED_ERRORS: usize = 5;

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("import-{}", started_ts.format("%Y%m%dT%H%M%SZ"));

    let files = discover_spreadsheets(&args.path)?;
    info!(
        path = %args.path.display(),
        files = files.len(),
        run_id = %run_id,
        "starting import"
    );

    let mut store = SqliteRecordStore::open(&args.store.db_path)?;
    let parser = CompositeParser::new()?;
    let normalizer = RowNormalizer::new(&parser, today_date_string());
    let options = ImportOptions {
        walk: WalkOptions {
            max_rows: args.max_rows,
            strict_headers: args.strict_headers,
        },
        skip_existing_tags: args.skip_existing_tags,
    };

    let mut outcomes = Vec::with_capacity(files.len());
    for file in &files {
        match import_file(file, &args, &mut store, &normalizer, &options) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                error!(path = %file.display(), error = %err, "import failed");
                outcomes.push(FileImportOutcome {
                    path: file.display().to_string(),
                    status: "failed".to_string(),
                    sheet_name: None,
                    sha256: None,
                    failure_reason: Some(format!("{err:#}")),
                    report: None,
                });
            }
        }
    }

    let failed_files = outcomes
        .iter()
        .filter(|outcome| outcome.status == "failed")
        .count();

    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id,
        status: if failed_files == 0 {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        db_path: args.store.db_path.display().to_string(),
        column_layout_version: COLUMN_LAYOUT_VERSION.to_string(),
        files: outcomes,
    };

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote import report");
    }

    if args.json {
        write_json_stdout(&manifest)?;
    } else {
        write_text_summary(&manifest)?;
    }

    if failed_files > 0 {
        bail!(
            "{failed_files} of {} file(s) could not be imported",
            manifest.files.len()
        );
    }

    Ok(())
}

fn import_file(
    path: &Path,
    args: &ImportArgs,
    store: &mut SqliteRecordStore,
    normalizer: &RowNormalizer<'_>,
    options: &ImportOptions,
) -> Result<FileImportOutcome> {
    info!(path = %path.display(), "processing spreadsheet");

    let loaded = load_worksheet(path, args.sheet.as_deref(), args.max_file_size)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let sha256 = match sha256_file(path) {
        Ok(digest) => Some(digest),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "failed to hash spreadsheet"
            );
            None
        }
    };

    let report = import_sheet(&loaded.grid, store, normalizer, options)?;
    if report.accepted.is_empty() {
        warn!(path = %path.display(), "no valid records found in spreadsheet");
    }

    let upload = NewUpload {
        filename,
        file_path: loaded.path.display().to_string(),
        file_size: loaded.file_size,
        sha256: sha256.clone().unwrap_or_default(),
        sheet_name: loaded.sheet_name.clone(),
        rows_accepted: report.accepted.len(),
        records_imported: report.summary.successful,
        records_failed: report.summary.failed,
    };
    if let Err(err) = store.log_upload(&upload) {
        warn!(path = %path.display(), error = %err, "failed to record upload history");
    }

    Ok(FileImportOutcome {
        path: path.display().to_string(),
        status: "completed".to_string(),
        sheet_name: Some(loaded.sheet_name),
        sha256,
        failure_reason: None,
        report: Some(report),
    })
}

/// A file path is taken as-is; a directory yields its spreadsheets, sorted.
pub(crate) fn discover_spreadsheets(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to inspect {}", path.display()))?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let entries =
        fs::read_dir(path).with_context(|| format!("failed to read {}", path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", path.display()))?;
        let entry_path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", entry_path.display()))?
            .is_file()
        {
            continue;
        }

        if is_spreadsheet_path(&entry_path) {
            files.push(entry_path);
        }
    }

    if files.is_empty() {
        bail!("no spreadsheets found in {}", path.display());
    }

    files.sort();
    Ok(files)
}

fn write_text_summary(manifest: &ImportRunManifest) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for outcome in &manifest.files {
        let Some(report) = &outcome.report else {
            writeln!(
                output,
                "{}: FAILED {}",
                outcome.path,
                outcome.failure_reason.as_deref().unwrap_or("unknown error")
            )?;
            continue;
        };

        let summary = &report.summary;
        writeln!(
            output,
            "{} [{}]: rows={} successful={} failed={} skipped={} rejected={}{}",
            outcome.path,
            outcome.sheet_name.as_deref().unwrap_or_default(),
            summary.total_rows,
            summary.successful,
            summary.failed,
            summary.skipped,
            report.rejected.len(),
            if summary.truncated { " (truncated)" } else { "" },
        )?;

        for message in summary.errors.iter().take(MAX_REPORTED_ERRORS) {
            writeln!(output, "  error: {message}")?;
        }
        if summary.errors.len() > MAX_REPORTED_ERRORS {
            writeln!(
                output,
                "  ... {} more error(s)",
                summary.errors.len() - MAX_REPORTED_ERRORS
            )?;
        }
        for rejected in report.rejected.iter().take(MAX_REPORTED_ERRORS) {
            writeln!(output, "  rejected row {}: {}", rejected.row, rejected.reason)?;
        }
    }

    output.flush()?;
    Ok(())
}
