use crate::workbook::{Cell, Worksheet};

/// Raw cell at `(row, col)`. An absent sheet or an absent cell both read as `None`.
pub fn get_cell<S: Worksheet + ?Sized>(sheet: Option<&S>, row: usize, col: usize) -> Option<&Cell> {
    sheet?.cell(row, col)
}

/// Text form of the cell at `(row, col)`, `""` when there is nothing there.
pub fn get_cell_text<S: Worksheet + ?Sized>(sheet: Option<&S>, row: usize, col: usize) -> String {
    get_cell(sheet, row, col)
        .map(Cell::display_text)
        .unwrap_or_default()
}
