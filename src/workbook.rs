//! Worksheet source: turns xlsx/xls/ods/csv files into a read-only grid of
//! cells addressed by zero-based `(row, column)`.

use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::error::ImportError;
use crate::util::ISO_DATE_FORMAT;

pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    Error(String),
}

impl Cell {
    /// Text form of the cell as a spreadsheet user would read it.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(value) => format_number(*value),
            Self::Int(value) => value.to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Date(date) => date.format(ISO_DATE_FORMAT).to_string(),
            Self::Error(code) => code.clone(),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Grid abstraction consumed by the import pipeline.
pub trait Worksheet {
    /// `(rows, columns)` of the used range, or `None` for an empty sheet.
    fn bounds(&self) -> Option<(usize, usize)>;

    fn cell(&self, row: usize, col: usize) -> Option<&Cell>;
}

#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<Vec<Option<Cell>>>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, || None);
        }
        cells[col] = Some(cell);
    }

    /// Builds a grid of text cells; empty strings become absent cells.
    pub fn from_text_rows<R, S>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut grid = Self::new();
        for (row_idx, row) in rows.into_iter().enumerate() {
            for (col_idx, value) in row.into_iter().enumerate() {
                let value = value.as_ref();
                if !value.is_empty() {
                    grid.set(row_idx, col_idx, Cell::Text(value.to_string()));
                }
            }
        }
        grid
    }
}

impl Worksheet for Grid {
    fn bounds(&self) -> Option<(usize, usize)> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if self.rows.is_empty() || width == 0 {
            None
        } else {
            Some((self.rows.len(), width))
        }
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

#[derive(Debug)]
pub struct LoadedSheet {
    pub path: PathBuf,
    pub sheet_name: String,
    pub file_size: u64,
    pub grid: Grid,
}

pub fn is_spreadsheet_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Opens `path` and materializes the requested (or first) worksheet.
pub fn load_worksheet(
    path: &Path,
    sheet: Option<&str>,
    max_file_size: u64,
) -> Result<LoadedSheet, ImportError> {
    if !is_spreadsheet_path(path) {
        return Err(ImportError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let file_size = std::fs::metadata(path)
        .map_err(|err| unreadable(path, err))?
        .len();
    if file_size > max_file_size {
        return Err(ImportError::FileTooLarge {
            path: path.to_path_buf(),
            size: file_size,
            limit: max_file_size,
        });
    }

    let (sheet_name, grid) = if is_csv_path(path) {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("csv")
            .to_string();
        (name, read_csv_grid(path)?)
    } else {
        read_workbook_grid(path, sheet)?
    };

    info!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = grid.bounds().map(|(rows, _)| rows).unwrap_or(0),
        "loaded worksheet"
    );

    Ok(LoadedSheet {
        path: path.to_path_buf(),
        sheet_name,
        file_size,
        grid,
    })
}

fn read_workbook_grid(path: &Path, sheet: Option<&str>) -> Result<(String, Grid), ImportError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| unreadable(path, err))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let chosen = match sheet {
        Some(requested) => sheet_names.iter().find(|name| name.as_str() == requested),
        None => sheet_names.first(),
    }
    .cloned()
    .ok_or_else(|| ImportError::NoWorksheet {
        path: path.to_path_buf(),
        sheet: sheet.map(ToOwned::to_owned),
    })?;

    let range = workbook
        .worksheet_range(&chosen)
        .map_err(|err| unreadable(path, err))?;

    let (row_offset, col_offset) = range
        .start()
        .map(|(row, col)| (row as usize, col as usize))
        .unwrap_or((0, 0));

    let mut grid = Grid::new();
    for (row, col, data) in range.cells() {
        if let Some(cell) = convert_cell(data) {
            grid.set(row + row_offset, col + col_offset, cell);
        }
    }

    debug!(sheet = %chosen, available = sheet_names.len(), "selected worksheet");
    Ok((chosen, grid))
}

fn convert_cell(data: &Data) -> Option<Cell> {
    match data {
        Data::Empty => None,
        Data::String(text) if text.is_empty() => None,
        Data::String(text) => Some(Cell::Text(text.clone())),
        Data::Float(value) => Some(Cell::Number(*value)),
        Data::Int(value) => Some(Cell::Int(*value)),
        Data::Bool(value) => Some(Cell::Bool(*value)),
        Data::DateTime(value) => Some(
            excel_serial_to_date(value.as_f64())
                .map(Cell::Date)
                .unwrap_or(Cell::Number(value.as_f64())),
        ),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Some(Cell::Text(text.clone())),
        Data::Error(code) => Some(Cell::Error(code.to_string())),
    }
}

/// 1900 date system; serial 1 is 1900-01-01 once the leap-year bug is folded
/// into the 1899-12-30 epoch.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn read_csv_grid(path: &Path) -> Result<Grid, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| unreadable(path, err))?;

    // Byte records: a stray Latin-1 byte in one field must not fail the file.
    let mut grid = Grid::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| unreadable(path, err))?;
        for (col_idx, field) in record.iter().enumerate() {
            if !field.is_empty() {
                let text = String::from_utf8_lossy(field);
                grid.set(row_idx, col_idx, Cell::Text(text.into_owned()));
            }
        }
    }

    Ok(grid)
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> ImportError {
    ImportError::Unreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rust_xlsxwriter::Workbook;

    use super::*;

    #[test]
    fn grid_reports_bounds_and_absent_cells() {
        let grid = Grid::from_text_rows([vec!["a", "", "c"], vec!["d"]]);
        assert_eq!(grid.bounds(), Some((2, 3)));
        assert_eq!(grid.cell(0, 2), Some(&Cell::Text("c".to_string())));
        assert!(grid.cell(0, 1).is_none());
        assert!(grid.cell(1, 2).is_none());
        assert!(grid.cell(42, 0).is_none());
        assert_eq!(Grid::new().bounds(), None);
    }

    #[test]
    fn numbers_render_without_spurious_fraction() {
        assert_eq!(Cell::Number(1001.0).display_text(), "1001");
        assert_eq!(Cell::Number(12.5).display_text(), "12.5");
        assert_eq!(Cell::Bool(true).display_text(), "TRUE");
    }

    #[test]
    fn excel_serials_map_to_calendar_dates() {
        assert_eq!(
            excel_serial_to_date(45306.0),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            excel_serial_to_date(45306.75),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn loads_csv_without_treating_first_row_as_header() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("invoices.csv");
        fs::write(&path, "Tag,Invoice To,Customer\n1A40D03000005DD1 Flower,,Theory Wellness\n")
            .expect("csv fixture should be written");

        let loaded = load_worksheet(&path, None, DEFAULT_MAX_FILE_SIZE).expect("csv should load");
        assert_eq!(loaded.sheet_name, "invoices");
        assert_eq!(loaded.grid.cell(0, 0), Some(&Cell::Text("Tag".to_string())));
        assert_eq!(
            loaded.grid.cell(1, 2),
            Some(&Cell::Text("Theory Wellness".to_string()))
        );
        assert!(loaded.grid.cell(1, 1).is_none());
    }

    #[test]
    fn csv_with_invalid_utf8_field_keeps_every_row() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("apex.csv");
        let mut bytes = b"Tag,Invoice To,Customer\n".to_vec();
        bytes.extend_from_slice(b"1A40D03000005DD1 Flower,,Theory Wellness\n");
        bytes.extend_from_slice(b"1A40D03000005DD2 Trim,,Caf\xe9 Labs\n");
        fs::write(&path, bytes).expect("csv fixture should be written");

        let loaded = load_worksheet(&path, None, DEFAULT_MAX_FILE_SIZE).expect("csv should load");
        assert_eq!(loaded.grid.bounds(), Some((3, 3)));
        assert_eq!(
            loaded.grid.cell(1, 2),
            Some(&Cell::Text("Theory Wellness".to_string()))
        );
        assert_eq!(
            loaded.grid.cell(2, 2),
            Some(&Cell::Text("Caf\u{FFFD} Labs".to_string()))
        );
    }

    #[test]
    fn loads_first_xlsx_sheet_with_typed_cells() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("apex.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Invoices").expect("sheet name should be valid");
        sheet.write_string(0, 0, "METRC Tag").expect("header write");
        sheet
            .write_string(1, 0, "1A40D03000005DD1000053021 Flower")
            .expect("tag write");
        sheet.write_number(1, 7, 12.5).expect("weight write");
        workbook.save(&path).expect("workbook should save");

        let loaded = load_worksheet(&path, None, DEFAULT_MAX_FILE_SIZE).expect("xlsx should load");
        assert_eq!(loaded.sheet_name, "Invoices");
        assert_eq!(loaded.grid.cell(1, 7), Some(&Cell::Number(12.5)));
        assert!(loaded.grid.cell(1, 2).is_none());
    }

    #[test]
    fn missing_named_sheet_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("apex.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).expect("workbook should save");

        let err = load_worksheet(&path, Some("Nope"), DEFAULT_MAX_FILE_SIZE)
            .expect_err("unknown sheet must fail");
        assert!(matches!(err, ImportError::NoWorksheet { .. }));
    }

    #[test]
    fn rejects_unsupported_and_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let text = dir.path().join("notes.txt");
        fs::write(&text, "hello").expect("fixture write");
        assert!(matches!(
            load_worksheet(&text, None, DEFAULT_MAX_FILE_SIZE),
            Err(ImportError::UnsupportedFormat { .. })
        ));

        let csv = dir.path().join("big.csv");
        fs::write(&csv, "a,b,c\n").expect("fixture write");
        assert!(matches!(
            load_worksheet(&csv, None, 2),
            Err(ImportError::FileTooLarge { size: 6, limit: 2, .. })
        ));
    }
}
