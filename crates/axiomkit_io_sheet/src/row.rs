//! One record to one document row.

use crate::book::SheetBook;
use crate::error::SheetExportResult;
use crate::record::SpecRecordAttributes;
use crate::spec::{
    EnumRecordValue, SpecBatchPlan, SpecCellFormat, SpecCellOverride, SpecExportOptions,
    SpecFormatHandle, SpecStylingPolicy,
};
use crate::style::{DictFormatPool, register_pooled_format};
use crate::util::{cast_col_num, derive_date_format};
use crate::value::convert_record_value;

/// Per-cell callback: `(property, raw value, record, scope)`.
///
/// The returned override replaces the value and/or the format of the cell
/// about to be written. `'cb` bounds what the callback may borrow.
pub type FnCellValue<'cb, R> = dyn FnMut(
        &str,
        &EnumRecordValue,
        &R,
        &mut SpecCellScope<'_>,
    ) -> SheetExportResult<SpecCellOverride>
    + 'cb;

/// What a cell callback may touch while one cell is being written.
pub struct SpecCellScope<'a> {
    book: &'a mut SheetBook,
    dict_fmt_pool: &'a mut DictFormatPool,
    n_idx_sheet: usize,
    n_row: u32,
    n_col: u16,
}

impl<'a> SpecCellScope<'a> {
    pub(crate) fn new(
        book: &'a mut SheetBook,
        dict_fmt_pool: &'a mut DictFormatPool,
        n_idx_sheet: usize,
        n_row: u32,
        n_col: u16,
    ) -> Self {
        Self {
            book,
            dict_fmt_pool,
            n_idx_sheet,
            n_row,
            n_col,
        }
    }

    /// Page of the cell.
    pub fn n_idx_sheet(&self) -> usize {
        self.n_idx_sheet
    }

    /// Zero-based row of the cell.
    pub fn n_row(&self) -> u32 {
        self.n_row
    }

    /// Zero-based column of the cell.
    pub fn n_col(&self) -> u16 {
        self.n_col
    }

    /// Document being written.
    pub fn book(&self) -> &SheetBook {
        self.book
    }

    /// Register a new format. Prefer the pool for formats used on many cells.
    pub fn create_format(&mut self, fmt: SpecCellFormat) -> SpecFormatHandle {
        self.book.create_format(fmt)
    }

    /// Pooled format `name`, if registered.
    pub fn pooled_format(&self, name: &str) -> Option<SpecFormatHandle> {
        self.dict_fmt_pool.get(name).copied()
    }

    /// Pooled format `name`, created from `fmt` on first use.
    pub fn register_pooled_format(&mut self, name: &str, fmt: SpecCellFormat) -> SpecFormatHandle {
        register_pooled_format(self.book, self.dict_fmt_pool, name, fmt)
    }
}

/// Where a record row lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRowTarget {
    pub n_idx_sheet: usize,
    pub n_row: u32,
    /// Create (and size) a fresh row; `false` reuses the row in place.
    pub if_create: bool,
}

/// Write the planned columns of one record into `target`.
///
/// Absent attributes produce no cell. Returns whether any written cell is
/// non-blank; a row without cells is blank.
#[allow(clippy::too_many_arguments)]
pub fn write_record_row<R>(
    book: &mut SheetBook,
    dict_fmt_pool: &mut DictFormatPool,
    target: SpecRowTarget,
    record: &R,
    attributes: &SpecRecordAttributes,
    plan: &SpecBatchPlan,
    styling: &SpecStylingPolicy,
    options: &SpecExportOptions,
    mut fn_cell_value: Option<&mut FnCellValue<'_, R>>,
) -> SheetExportResult<bool> {
    let SpecRowTarget {
        n_idx_sheet,
        n_row,
        if_create,
    } = target;
    if if_create {
        book.create_row(n_idx_sheet, n_row);
        if let Some(height) = plan.height_row {
            book.set_row_height(n_idx_sheet, n_row, height);
        }
    }

    let date_format_default = derive_date_format(&options.date_format);
    let mut if_non_blank = false;

    for (n_col, column) in plan.columns.iter().enumerate() {
        let Some(value_raw) = attributes.get(&column.property) else {
            continue;
        };
        let n_col = cast_col_num(n_col)?;

        let cell_override = match fn_cell_value.as_deref_mut() {
            Some(fn_cell_value) => {
                let mut scope =
                    SpecCellScope::new(book, dict_fmt_pool, n_idx_sheet, n_row, n_col);
                fn_cell_value(&column.property, value_raw, record, &mut scope)?
            }
            None => SpecCellOverride::keep(),
        };

        let fmt = match cell_override.fmt {
            Some(fmt) if book.is_valid_format(fmt) => Some(fmt),
            _ => column.fmt_cell,
        };
        let value = cell_override.value.as_ref().unwrap_or(value_raw);

        let (cell_value, if_blank) = convert_record_value(
            value,
            &column.property,
            styling,
            date_format_default,
            &options.value_policy,
        )?;
        book.write_cell(n_idx_sheet, n_row, n_col, cell_value, fmt);
        if !if_blank {
            if_non_blank = true;
        }
    }

    Ok(if_non_blank)
}
