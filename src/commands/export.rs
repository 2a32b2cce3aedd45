use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::cli::ExportArgs;
use crate::model::{CanonicalRecord, RecordFilters};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::util::{ensure_parent_directory, today_date_string};

pub const EXPORT_SHEET_NAME: &str = "X-Ray Records";

pub const EXPORT_COLUMNS: [&str; 14] = [
    "ID",
    "METRC Tag",
    "METRC Tag Full",
    "Customer",
    "Invoice To",
    "Invoice Weight",
    "Invoice Number",
    "Paid Date",
    "Tests Failed",
    "Lab",
    "Compliance Status",
    "Apex Invoice Note",
    "Date Created",
    "Date Updated",
];

#[derive(Debug, Clone, PartialEq)]
enum ExportValue {
    Text(String),
    Number(f64),
}

impl ExportValue {
    fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(value) => value.to_string(),
        }
    }
}

fn export_row(record: &CanonicalRecord) -> [ExportValue; 14] {
    use ExportValue::{Number, Text};

    [
        Number(record.id.unwrap_or_default() as f64),
        Text(record.metrc_tag.clone()),
        Text(record.metrc_tag_full.clone()),
        Text(record.customer.clone()),
        Text(record.invoice_to.clone()),
        Number(record.invoice_weight),
        Text(record.invoice_number.clone()),
        Text(record.paid_date.clone()),
        match record.tests_failed.count() {
            Some(count) => Number(f64::from(count)),
            None => Text(record.tests_failed.to_string()),
        },
        Text(record.lab.clone()),
        Text(record.compliance_status.clone()),
        Text(record.apex_invoice_note.clone()),
        Text(record.date_created.clone()),
        Text(record.date_updated.clone()),
    ]
}

pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!("xray-records-export-{}.xlsx", today_date_string()))
}

pub fn run(args: ExportArgs) -> Result<()> {
    let store = SqliteRecordStore::open(&args.store.db_path)?;
    let filters = RecordFilters::from(args.filters);
    let output = args.output.unwrap_or_else(default_export_path);

    let count = export_records(&store, &filters, &output)?;
    info!(path = %output.display(), records = count, "export complete");
    println!("{}", output.display());
    Ok(())
}

/// Writes matching records to `output` (CSV for a `.csv` extension, xlsx
/// otherwise) and returns how many were written.
pub fn export_records<R: RecordStore + ?Sized>(
    store: &R,
    filters: &RecordFilters,
    output: &Path,
) -> Result<usize> {
    let records = store.find_all(filters)?;
    if records.is_empty() {
        bail!("no records found to export");
    }

    ensure_parent_directory(output)?;
    let is_csv = output
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        write_csv(&records, output)?;
    } else {
        write_xlsx(&records, output)?;
    }
    Ok(records.len())
}

fn write_csv(records: &[CanonicalRecord], output: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    writer.write_record(EXPORT_COLUMNS)?;
    for record in records {
        writer.write_record(export_row(record).iter().map(ExportValue::to_text))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn write_xlsx(records: &[CanonicalRecord], output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(EXPORT_SHEET_NAME)
        .context("failed to name export worksheet")?;

    let header_format = Format::new().set_bold();
    for (col, header) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .context("failed to write export header")?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in export_row(record).iter().enumerate() {
            let written = match value {
                ExportValue::Text(text) => worksheet.write_string(row, col as u16, text),
                ExportValue::Number(number) => worksheet.write_number(row, col as u16, *number),
            };
            written.with_context(|| format!("failed to write export row {row}"))?;
        }
    }

    workbook
        .save(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestsFailed;
    use crate::workbook::{Cell, DEFAULT_MAX_FILE_SIZE, Worksheet, load_worksheet};

    fn store_with_records() -> SqliteRecordStore {
        let mut store = SqliteRecordStore::open_in_memory().expect("store");
        for (tag, customer, tests_failed) in [
            ("1A40D03000005DD1", "Theory Wellness", TestsFailed::Count(0)),
            (
                "1A40D03000005DD2",
                "Curaleaf",
                TestsFailed::Description("Total Yeast & Mold".to_string()),
            ),
        ] {
            store
                .insert(&CanonicalRecord {
                    metrc_tag: tag.to_string(),
                    customer: customer.to_string(),
                    invoice_weight: 12.5,
                    tests_failed,
                    date_created: "2024-01-15".to_string(),
                    date_updated: "2024-01-15".to_string(),
                    ..CanonicalRecord::default()
                })
                .expect("insert");
        }
        store
    }

    #[test]
    fn xlsx_export_writes_header_and_rows() {
        let store = store_with_records();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out/records.xlsx");

        let count = export_records(&store, &RecordFilters::default(), &path).expect("export");
        assert_eq!(count, 2);

        let loaded = load_worksheet(&path, None, DEFAULT_MAX_FILE_SIZE).expect("reload");
        assert_eq!(loaded.sheet_name, EXPORT_SHEET_NAME);
        assert_eq!(loaded.grid.bounds(), Some((3, EXPORT_COLUMNS.len())));
        assert_eq!(
            loaded.grid.cell(0, 1),
            Some(&Cell::Text("METRC Tag".to_string()))
        );
        assert_eq!(loaded.grid.cell(1, 5).map(Cell::display_text), Some("12.5".to_string()));
    }

    #[test]
    fn csv_export_respects_filters() {
        let store = store_with_records();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.csv");
        let filters = RecordFilters {
            customer: Some("curaleaf".to_string()),
            ..RecordFilters::default()
        };

        assert_eq!(export_records(&store, &filters, &path).expect("export"), 1);
        let text = std::fs::read_to_string(&path).expect("read csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID,METRC Tag,METRC Tag Full,Customer"));
        assert!(lines[1].contains("Total Yeast & Mold"));
    }

    #[test]
    fn empty_export_is_an_error() {
        let store = SqliteRecordStore::open_in_memory().expect("store");
        let dir = tempfile::tempdir().expect("tempdir");
        let err = export_records(&store, &RecordFilters::default(), &dir.path().join("x.xlsx"))
            .expect_err("empty export should fail");
        assert!(err.to_string().contains("no records found"));
    }

    #[test]
    fn default_path_carries_todays_date() {
        let path = default_export_path();
        let name = path.to_string_lossy();
        assert!(name.starts_with("xray-records-export-"));
        assert!(name.ends_with(".xlsx"));
    }
}
