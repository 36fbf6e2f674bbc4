//! In-memory document model shared by all backends.
//!
//! The engine writes pages, rows and cells here; a backend renders the
//! finished book into its binary layout on `save`.

use std::collections::BTreeMap;

use crate::spec::{EnumCellValue, SpecCellFormat, SpecFormatHandle};

/// One written cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCell {
    /// Cell value.
    pub value: EnumCellValue,
    /// Cell format, `None` for the backend default.
    pub fmt: Option<SpecFormatHandle>,
}

/// One created row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRow {
    /// Height in points, `None` for the backend default.
    pub height: Option<f64>,
    /// Cells by zero-based column.
    pub cells: BTreeMap<u16, SpecCell>,
}

/// One worksheet (page).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheet {
    /// Unique sheet name.
    pub name: String,
    /// Rows by zero-based index.
    pub rows: BTreeMap<u32, SpecRow>,
    /// Column widths in characters by zero-based column.
    pub widths: BTreeMap<u16, f64>,
}

impl SpecSheet {
    /// Number of created rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Row at `n_row`.
    pub fn row(&self, n_row: u32) -> Option<&SpecRow> {
        self.rows.get(&n_row)
    }

    /// Cell at `(n_row, n_col)`.
    pub fn cell(&self, n_row: u32, n_col: u16) -> Option<&SpecCell> {
        self.rows.get(&n_row).and_then(|row| row.cells.get(&n_col))
    }

    /// `(first_row, last_row_exclusive, first_col, last_col_exclusive)` of used cells.
    pub fn dimensions(&self) -> (u32, u32, u16, u16) {
        let Some((n_row_first, _)) = self.rows.first_key_value() else {
            return (0, 0, 0, 0);
        };
        let n_row_last = self.rows.keys().next_back().copied().unwrap_or(*n_row_first);

        let mut n_col_first = u16::MAX;
        let mut n_col_last = 0u16;
        for row in self.rows.values() {
            if let Some((n_col, _)) = row.cells.first_key_value() {
                n_col_first = n_col_first.min(*n_col);
            }
            if let Some((n_col, _)) = row.cells.last_key_value() {
                n_col_last = n_col_last.max(n_col.saturating_add(1));
            }
        }
        if n_col_first == u16::MAX {
            n_col_first = 0;
        }

        (*n_row_first, n_row_last + 1, n_col_first, n_col_last)
    }
}

/// Workbook under construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetBook {
    sheets: Vec<SpecSheet>,
    formats: Vec<SpecCellFormat>,
}

impl SheetBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a worksheet and return its index.
    pub fn create_sheet(&mut self, name: impl Into<String>) -> usize {
        self.sheets.push(SpecSheet {
            name: name.into(),
            ..Default::default()
        });
        self.sheets.len() - 1
    }

    /// Create (or replace) the row at `n_row`.
    pub fn create_row(&mut self, n_idx_sheet: usize, n_row: u32) {
        if let Some(sheet) = self.sheets.get_mut(n_idx_sheet) {
            sheet.rows.insert(n_row, SpecRow::default());
        }
    }

    /// Set the height of the row at `n_row`, creating it if needed.
    pub fn set_row_height(&mut self, n_idx_sheet: usize, n_row: u32, height: f64) {
        if let Some(sheet) = self.sheets.get_mut(n_idx_sheet) {
            sheet.rows.entry(n_row).or_default().height = Some(height);
        }
    }

    /// Set the width of column `n_col` in characters.
    pub fn set_column_width(&mut self, n_idx_sheet: usize, n_col: u16, width: f64) {
        if let Some(sheet) = self.sheets.get_mut(n_idx_sheet) {
            sheet.widths.insert(n_col, width);
        }
    }

    /// Write a cell, creating its row if needed.
    pub fn write_cell(
        &mut self,
        n_idx_sheet: usize,
        n_row: u32,
        n_col: u16,
        value: EnumCellValue,
        fmt: Option<SpecFormatHandle>,
    ) {
        if let Some(sheet) = self.sheets.get_mut(n_idx_sheet) {
            sheet
                .rows
                .entry(n_row)
                .or_default()
                .cells
                .insert(n_col, SpecCell { value, fmt });
        }
    }

    /// Register a format and return its handle.
    pub fn create_format(&mut self, fmt: SpecCellFormat) -> SpecFormatHandle {
        self.formats.push(fmt);
        SpecFormatHandle(self.formats.len() - 1)
    }

    /// Whether `fmt` belongs to this book.
    pub fn is_valid_format(&self, fmt: SpecFormatHandle) -> bool {
        fmt.0 < self.formats.len()
    }

    /// Format behind `fmt`.
    pub fn format(&self, fmt: SpecFormatHandle) -> Option<&SpecCellFormat> {
        self.formats.get(fmt.0)
    }

    /// All registered formats in handle order.
    pub fn formats(&self) -> &[SpecCellFormat] {
        &self.formats
    }

    /// All worksheets in creation order.
    pub fn sheets(&self) -> &[SpecSheet] {
        &self.sheets
    }

    /// Worksheet at `n_idx_sheet`.
    pub fn sheet(&self, n_idx_sheet: usize) -> Option<&SpecSheet> {
        self.sheets.get(n_idx_sheet)
    }

    /// Cell at `(n_idx_sheet, n_row, n_col)`.
    pub fn cell(&self, n_idx_sheet: usize, n_row: u32, n_col: u16) -> Option<&SpecCell> {
        self.sheet(n_idx_sheet).and_then(|sheet| sheet.cell(n_row, n_col))
    }
}
