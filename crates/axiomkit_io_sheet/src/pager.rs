//! Page lifecycle: when to open a page, what goes on top of it, and where
//! the next record row lands.

use std::collections::BTreeSet;

use log::debug;

use crate::book::SheetBook;
use crate::conf::N_ROWS_RESERVED_MAX;
use crate::error::{SheetExportError, SheetExportResult};
use crate::record::SpecRecordAttributes;
use crate::row::{FnCellValue, SpecRowTarget, write_record_row};
use crate::spec::{
    EnumCellValue, SpecBatchPlan, SpecCellFormat, SpecExportOptions, SpecFormatHandle,
    SpecStylingPolicy,
};
use crate::style::{DictFormatPool, register_pooled_format};
use crate::util::{
    cast_col_num, cast_row_num, create_sheet_identifier, derive_unique_sheet_name,
    sanitize_sheet_name,
};

/// Callback run on each new page to fill the reserved rows.
pub type FnRowsReserved<'cb> = dyn FnMut(&mut SpecSheetScope<'_>) -> SheetExportResult<()> + 'cb;

////////////////////////////////////////////////////////////////////////////////
// #region DocumentCursor

/// Position of the writer inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocumentCursor {
    /// Current page, `None` before the first page.
    pub n_idx_sheet: Option<usize>,
    /// Current row in the page, `-1` before the first row.
    pub n_row: i64,
    /// Row capacity of one page including reserved and title rows.
    pub n_rows_allowed: usize,
    /// First row after the reserved rows.
    pub n_row_start: usize,
    /// Whether the last record row was blank and is kept for overwrite.
    pub if_last_row_blank: bool,
    /// Non-blank rows written, title rows included.
    pub n_rows_non_blank: usize,
    /// Pages created.
    pub n_sheets: usize,
}

impl SpecDocumentCursor {
    /// Cursor before the first page of a session configured by `options`.
    pub fn new(options: &SpecExportOptions) -> SheetExportResult<Self> {
        Ok(Self {
            n_idx_sheet: None,
            n_row: -1,
            n_rows_allowed: derive_rows_allowed(options)?,
            n_row_start: options.rows_reserved,
            if_last_row_blank: false,
            n_rows_non_blank: 0,
            n_sheets: 0,
        })
    }

    /// Whether the next record needs a new page.
    pub fn need_new_sheet(&self, if_skip_blank_rows: bool) -> bool {
        if self.n_idx_sheet.is_none() {
            return true;
        }
        let n_row_next = if self.if_last_row_blank && if_skip_blank_rows {
            self.n_row
        } else {
            self.n_row + 1
        };
        n_row_next >= self.n_rows_allowed as i64
    }

    /// Non-blank data rows: non-blank rows minus one title row per page.
    pub fn n_rows_data(&self, if_write_title: bool) -> usize {
        if if_write_title {
            self.n_rows_non_blank.saturating_sub(self.n_sheets)
        } else {
            self.n_rows_non_blank
        }
    }
}

/// Row capacity of one page.
///
/// `rows_per_page <= 0` means the format ceiling. Fails when reserved rows
/// exceed their maximum or the capacity exceeds the ceiling.
pub fn derive_rows_allowed(options: &SpecExportOptions) -> SheetExportResult<usize> {
    if options.rows_reserved > N_ROWS_RESERVED_MAX {
        return Err(SheetExportError::config(format!(
            "rows_reserved {} exceeds the maximum {N_ROWS_RESERVED_MAX}.",
            options.rows_reserved
        )));
    }

    let n_rows_max = options.format_kind.n_rows_max();
    if options.rows_per_page <= 0 {
        return Ok(n_rows_max);
    }

    let n_rows_allowed = usize::try_from(options.rows_per_page)
        .ok()
        .and_then(|n| n.checked_add(options.rows_reserved))
        .and_then(|n| n.checked_add(usize::from(options.if_write_title)));
    match n_rows_allowed {
        Some(n) if n <= n_rows_max => Ok(n),
        _ => Err(SheetExportError::config(format!(
            "rows per page {} with {} reserved rows exceeds the {:?} row ceiling {n_rows_max}.",
            options.rows_per_page, options.rows_reserved, options.format_kind
        ))),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetScope

/// What the reserved-rows callback may touch on a new page.
///
/// Row writes are limited to the reserved rows.
pub struct SpecSheetScope<'a> {
    book: &'a mut SheetBook,
    dict_fmt_pool: &'a mut DictFormatPool,
    n_idx_sheet: usize,
    n_rows_reserved: usize,
    n_sheets: usize,
    n_rows_non_blank: usize,
}

impl SpecSheetScope<'_> {
    /// New page index.
    pub fn n_idx_sheet(&self) -> usize {
        self.n_idx_sheet
    }

    /// Reserved rows at the top of the page.
    pub fn n_rows_reserved(&self) -> usize {
        self.n_rows_reserved
    }

    /// Pages created so far, this one included.
    pub fn n_sheets(&self) -> usize {
        self.n_sheets
    }

    /// Non-blank rows written before this page.
    pub fn n_rows_non_blank(&self) -> usize {
        self.n_rows_non_blank
    }

    pub fn book(&self) -> &SheetBook {
        self.book
    }

    /// Create (or replace) reserved row `n_row`.
    pub fn create_row(&mut self, n_row: usize) -> SheetExportResult<()> {
        let n_row = self.validate_reserved_row(n_row)?;
        self.book.create_row(self.n_idx_sheet, n_row);
        Ok(())
    }

    pub fn set_row_height(&mut self, n_row: usize, height: f64) -> SheetExportResult<()> {
        let n_row = self.validate_reserved_row(n_row)?;
        self.book.set_row_height(self.n_idx_sheet, n_row, height);
        Ok(())
    }

    /// Write a cell in reserved row `n_row`.
    pub fn write_cell(
        &mut self,
        n_row: usize,
        n_col: usize,
        value: EnumCellValue,
        fmt: Option<SpecFormatHandle>,
    ) -> SheetExportResult<()> {
        let n_row = self.validate_reserved_row(n_row)?;
        let n_col = cast_col_num(n_col)?;
        self.book.write_cell(self.n_idx_sheet, n_row, n_col, value, fmt);
        Ok(())
    }

    pub fn create_format(&mut self, fmt: SpecCellFormat) -> SpecFormatHandle {
        self.book.create_format(fmt)
    }

    pub fn pooled_format(&self, name: &str) -> Option<SpecFormatHandle> {
        self.dict_fmt_pool.get(name).copied()
    }

    pub fn register_pooled_format(&mut self, name: &str, fmt: SpecCellFormat) -> SpecFormatHandle {
        register_pooled_format(self.book, self.dict_fmt_pool, name, fmt)
    }

    fn validate_reserved_row(&self, n_row: usize) -> SheetExportResult<u32> {
        if n_row >= self.n_rows_reserved {
            return Err(SheetExportError::config(format!(
                "row {n_row} is outside the {} reserved rows.",
                self.n_rows_reserved
            )));
        }
        cast_row_num(n_row)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetPager

/// Mutable state and resolved inputs a page operation works on.
pub struct SpecPageContext<'a, R> {
    pub book: &'a mut SheetBook,
    pub dict_fmt_pool: &'a mut DictFormatPool,
    pub plan: &'a SpecBatchPlan,
    pub styling: &'a SpecStylingPolicy,
    pub fn_rows_reserved: Option<&'a mut FnRowsReserved<'a>>,
    pub fn_cell_value: Option<&'a mut FnCellValue<'a, R>>,
}

/// Pagination engine of one session.
#[derive(Debug, Clone)]
pub struct SheetPager {
    options: SpecExportOptions,
    cursor: SpecDocumentCursor,
    set_sheet_names_existing: BTreeSet<String>,
}

impl SheetPager {
    /// Validate `options` and start before the first page.
    pub fn new(options: SpecExportOptions) -> SheetExportResult<Self> {
        let cursor = SpecDocumentCursor::new(&options)?;
        Ok(Self {
            options,
            cursor,
            set_sheet_names_existing: BTreeSet::new(),
        })
    }

    pub fn options(&self) -> &SpecExportOptions {
        &self.options
    }

    pub fn cursor(&self) -> &SpecDocumentCursor {
        &self.cursor
    }

    pub fn need_new_sheet(&self) -> bool {
        self.cursor.need_new_sheet(self.options.if_skip_blank_rows)
    }

    /// Open a new page: widths, reserved rows, then the title row.
    ///
    /// Returns the page index.
    pub fn init_sheet<R>(&mut self, ctx: &mut SpecPageContext<'_, R>) -> SheetExportResult<usize> {
        let n_sheet = self.cursor.n_sheets + 1;
        let c_name = derive_unique_sheet_name(
            &create_sheet_identifier(&sanitize_sheet_name(&self.options.sheet_name, "_"), n_sheet),
            &mut self.set_sheet_names_existing,
        );
        let n_idx_sheet = ctx.book.create_sheet(c_name.as_str());
        for (n_col, column) in ctx.plan.columns.iter().enumerate() {
            if let Some(width) = column.width {
                ctx.book
                    .set_column_width(n_idx_sheet, cast_col_num(n_col)?, width);
            }
        }

        self.cursor.n_idx_sheet = Some(n_idx_sheet);
        self.cursor.n_sheets = n_sheet;
        self.cursor.n_row = self.cursor.n_row_start as i64 - 1;
        self.cursor.if_last_row_blank = false;
        debug!("Opened page {c_name:?} ({n_sheet}).");

        if self.options.rows_reserved > 0
            && let Some(fn_rows_reserved) = ctx.fn_rows_reserved.as_deref_mut()
        {
            let mut scope = SpecSheetScope {
                book: ctx.book,
                dict_fmt_pool: ctx.dict_fmt_pool,
                n_idx_sheet,
                n_rows_reserved: self.options.rows_reserved,
                n_sheets: self.cursor.n_sheets,
                n_rows_non_blank: self.cursor.n_rows_non_blank,
            };
            fn_rows_reserved(&mut scope)?;
        }

        if self.options.if_write_title {
            self.write_title(n_idx_sheet, ctx)?;
        }
        Ok(n_idx_sheet)
    }

    fn write_title<R>(
        &mut self,
        n_idx_sheet: usize,
        ctx: &mut SpecPageContext<'_, R>,
    ) -> SheetExportResult<()> {
        self.cursor.n_row += 1;
        let n_row = cast_row_num(self.cursor.n_row as usize)?;
        ctx.book.create_row(n_idx_sheet, n_row);
        if let Some(height) = ctx.plan.height_title_row {
            ctx.book.set_row_height(n_idx_sheet, n_row, height);
        }
        for (n_col, column) in ctx.plan.columns.iter().enumerate() {
            let Some(title) = &column.title else {
                continue;
            };
            ctx.book.write_cell(
                n_idx_sheet,
                n_row,
                cast_col_num(n_col)?,
                EnumCellValue::String(title.clone()),
                column.fmt_title,
            );
        }
        self.cursor.n_rows_non_blank += 1;
        Ok(())
    }

    /// Write one record, opening a page first when the current one is full.
    pub fn write_record<R>(
        &mut self,
        record: &R,
        attributes: &SpecRecordAttributes,
        ctx: &mut SpecPageContext<'_, R>,
    ) -> SheetExportResult<()> {
        if self.need_new_sheet() {
            self.init_sheet(ctx)?;
        }
        let Some(n_idx_sheet) = self.cursor.n_idx_sheet else {
            return Err(SheetExportError::config("no page is open."));
        };

        let if_reuse = self.cursor.if_last_row_blank && self.options.if_skip_blank_rows;
        if !if_reuse {
            self.cursor.n_row += 1;
        }
        let target = SpecRowTarget {
            n_idx_sheet,
            n_row: cast_row_num(self.cursor.n_row as usize)?,
            if_create: !if_reuse,
        };

        let if_non_blank = write_record_row(
            ctx.book,
            ctx.dict_fmt_pool,
            target,
            record,
            attributes,
            ctx.plan,
            ctx.styling,
            &self.options,
            ctx.fn_cell_value.as_deref_mut(),
        )?;

        if if_non_blank {
            self.cursor.n_rows_non_blank += 1;
            self.cursor.if_last_row_blank = false;
        } else if self.options.if_skip_blank_rows {
            self.cursor.if_last_row_blank = true;
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::EnumFormatKind;
    use crate::spec::{EnumRecordValue, SpecColumnPlan};

    fn derive_plan(if_title: bool) -> SpecBatchPlan {
        SpecBatchPlan {
            columns: vec![SpecColumnPlan {
                property: "id".to_string(),
                title: if_title.then(|| "ID".to_string()),
                fmt_cell: None,
                fmt_title: None,
                width: Some(12.0),
            }],
            height_row: None,
            height_title_row: Some(30.0),
        }
    }

    fn write_all(
        pager: &mut SheetPager,
        book: &mut SheetBook,
        l_records: &[SpecRecordAttributes],
    ) {
        let plan = derive_plan(pager.options().if_write_title);
        let styling = SpecStylingPolicy::default();
        let mut dict_fmt_pool = DictFormatPool::new();
        let mut ctx = SpecPageContext::<SpecRecordAttributes> {
            book,
            dict_fmt_pool: &mut dict_fmt_pool,
            plan: &plan,
            styling: &styling,
            fn_rows_reserved: None,
            fn_cell_value: None,
        };
        for record in l_records {
            pager.write_record(record, record, &mut ctx).unwrap();
        }
    }

    fn derive_records(n: i64) -> Vec<SpecRecordAttributes> {
        (0..n)
            .map(|i| SpecRecordAttributes::new().with("id", i))
            .collect()
    }

    #[test]
    fn test_rows_allowed() {
        let mut options = SpecExportOptions::default();
        assert_eq!(derive_rows_allowed(&options).unwrap(), 1_048_576);

        options.rows_per_page = 5;
        options.rows_reserved = 2;
        assert_eq!(derive_rows_allowed(&options).unwrap(), 8);

        options.rows_reserved = 257;
        assert!(derive_rows_allowed(&options).unwrap_err().is_config());

        options.rows_reserved = 0;
        options.format_kind = EnumFormatKind::Legacy;
        options.rows_per_page = 65_535;
        assert!(derive_rows_allowed(&options).unwrap_err().is_config());
    }

    #[test]
    fn test_pages_split_at_rows_per_page() {
        let mut pager = SheetPager::new(SpecExportOptions {
            rows_per_page: 5,
            ..Default::default()
        })
        .unwrap();
        let mut book = SheetBook::new();
        write_all(&mut pager, &mut book, &derive_records(12));

        let l_rows: Vec<usize> = book.sheets().iter().map(|s| s.n_rows()).collect();
        assert_eq!(l_rows, [6, 6, 3]);
        assert_eq!(book.sheets()[2].name, "Sheet3");
        assert_eq!(book.sheets()[0].widths.get(&0), Some(&12.0));
        assert_eq!(book.sheets()[1].row(0).unwrap().height, Some(30.0));
        assert_eq!(pager.cursor().n_rows_non_blank, 15);
        assert_eq!(pager.cursor().n_rows_data(true), 12);
    }

    #[test]
    fn test_blank_row_is_overwritten_by_next_record() {
        let mut pager = SheetPager::new(SpecExportOptions::default()).unwrap();
        let mut book = SheetBook::new();
        let l_records = vec![
            SpecRecordAttributes::new().with("id", 1i64),
            SpecRecordAttributes::new().with("other", 0i64),
            SpecRecordAttributes::new().with("id", EnumRecordValue::Null),
            SpecRecordAttributes::new().with("id", 2i64),
        ];
        write_all(&mut pager, &mut book, &l_records);

        let sheet = &book.sheets()[0];
        assert_eq!(sheet.n_rows(), 3);
        assert_eq!(sheet.cell(2, 0).unwrap().value, EnumCellValue::Number(2.0));
        assert_eq!(pager.cursor().n_rows_non_blank, 3);
        assert_eq!(pager.cursor().n_row, 2);
    }

    #[test]
    fn test_trailing_blank_row_stays_visible() {
        let mut pager = SheetPager::new(SpecExportOptions::default()).unwrap();
        let mut book = SheetBook::new();
        let l_records = vec![
            SpecRecordAttributes::new().with("id", 1i64),
            SpecRecordAttributes::new().with("id", EnumRecordValue::Null),
        ];
        write_all(&mut pager, &mut book, &l_records);

        assert_eq!(book.sheets()[0].n_rows(), 3);
        assert!(pager.cursor().if_last_row_blank);
        assert_eq!(pager.cursor().n_rows_data(true), 1);
    }

    #[test]
    fn test_blank_rows_occupy_capacity_without_suppression() {
        let mut pager = SheetPager::new(SpecExportOptions {
            if_skip_blank_rows: false,
            if_write_title: false,
            rows_per_page: 2,
            ..Default::default()
        })
        .unwrap();
        let mut book = SheetBook::new();
        let l_records = vec![
            SpecRecordAttributes::new(),
            SpecRecordAttributes::new(),
            SpecRecordAttributes::new().with("id", 1i64),
        ];
        write_all(&mut pager, &mut book, &l_records);

        assert_eq!(book.sheets().len(), 2);
        assert_eq!(pager.cursor().n_rows_non_blank, 1);
        assert_eq!(pager.cursor().n_rows_data(false), 1);
    }

    #[test]
    fn test_reserved_rows_callback_runs_per_page() {
        let mut pager = SheetPager::new(SpecExportOptions {
            rows_per_page: 1,
            rows_reserved: 2,
            ..Default::default()
        })
        .unwrap();
        let mut book = SheetBook::new();
        let plan = derive_plan(true);
        let styling = SpecStylingPolicy::default();
        let mut dict_fmt_pool = DictFormatPool::new();
        let mut fn_rows_reserved = |scope: &mut SpecSheetScope<'_>| -> SheetExportResult<()> {
            let n_sheets = scope.n_sheets();
            scope.write_cell(0, 0, EnumCellValue::Number(n_sheets as f64), None)?;
            assert!(scope.write_cell(2, 0, EnumCellValue::Boolean(true), None).is_err());
            Ok(())
        };
        let mut ctx = SpecPageContext::<SpecRecordAttributes> {
            book: &mut book,
            dict_fmt_pool: &mut dict_fmt_pool,
            plan: &plan,
            styling: &styling,
            fn_rows_reserved: Some(&mut fn_rows_reserved),
            fn_cell_value: None,
        };
        for record in derive_records(2) {
            pager.write_record(&record, &record, &mut ctx).unwrap();
        }

        assert_eq!(book.sheets().len(), 2);
        let sheet = &book.sheets()[1];
        assert_eq!(sheet.cell(0, 0).unwrap().value, EnumCellValue::Number(2.0));
        assert_eq!(
            sheet.cell(2, 0).unwrap().value,
            EnumCellValue::String("ID".to_string())
        );
        assert_eq!(sheet.cell(3, 0).unwrap().value, EnumCellValue::Number(1.0));
    }
}
