//! Stateful export session that writes record batches into paged sheets.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{debug, error, warn};

use crate::backend::{DocumentBackend, derive_backend};
use crate::book::SheetBook;
use crate::error::{SheetExportError, SheetExportResult};
use crate::pager::{FnRowsReserved, SheetPager, SpecDocumentCursor, SpecPageContext, SpecSheetScope};
use crate::record::{ExportRecord, SpecRecordAttributes, resolve_properties};
use crate::row::{FnCellValue, SpecCellScope};
use crate::spec::{
    EnumRecordValue, SpecBatchPlan, SpecCellFormat, SpecCellOverride, SpecColumnPlan,
    SpecExportColumns, SpecExportOptions, SpecExportReport, SpecFormatHandle, SpecStylingPolicy,
};
use crate::style::{
    DictFormatPool, ensure_default_formats, register_pooled_format, resolve_cell_format,
    resolve_column_width, resolve_title_format,
};
use crate::util::{
    derive_date_format, derive_unique_properties, parse_date_format, validate_column_count,
};
use crate::value::validate_bool_substitute;

/// Export session over one document.
///
/// Options are fixed at construction; columns, styling and callbacks may be
/// changed between [`Self::write`] calls. The document is kept in memory
/// until [`Self::end_write`].
///
/// Callbacks may borrow caller state for `'cb`.
pub struct SheetExportWriter<'cb, R: ExportRecord> {
    backend: Box<dyn DocumentBackend>,
    pager: SheetPager,
    columns: SpecExportColumns,
    styling: SpecStylingPolicy,
    dict_fmt_pool: DictFormatPool,
    fn_rows_reserved: Option<Box<FnRowsReserved<'cb>>>,
    fn_cell_value: Option<Box<FnCellValue<'cb, R>>>,
    report: SpecExportReport,
    if_closed: bool,
}

impl<'cb, R: ExportRecord> SheetExportWriter<'cb, R> {
    /// Create a session writing the layout selected by `options.format_kind`.
    pub fn new(options: SpecExportOptions) -> SheetExportResult<Self> {
        let backend = derive_backend(options.format_kind);
        Self::with_backend(options, backend)
    }

    /// Create a session over a caller-provided backend of the same layout.
    pub fn with_backend(
        options: SpecExportOptions,
        backend: Box<dyn DocumentBackend>,
    ) -> SheetExportResult<Self> {
        if backend.format_kind() != options.format_kind {
            return Err(SheetExportError::config(format!(
                "backend writes {:?} but options request {:?}.",
                backend.format_kind(),
                options.format_kind
            )));
        }
        let pager = SheetPager::new(options)?;

        Ok(Self {
            backend,
            pager,
            columns: SpecExportColumns::default(),
            styling: SpecStylingPolicy::default(),
            dict_fmt_pool: DictFormatPool::new(),
            fn_rows_reserved: None,
            fn_cell_value: None,
            report: SpecExportReport::default(),
            if_closed: false,
        })
    }

    ////////////////////////////////////////////////////////////////////////////
    // #region Accessors

    pub fn options(&self) -> &SpecExportOptions {
        self.pager.options()
    }

    pub fn columns(&self) -> &SpecExportColumns {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut SpecExportColumns {
        &mut self.columns
    }

    pub fn styling(&self) -> &SpecStylingPolicy {
        &self.styling
    }

    pub fn styling_mut(&mut self) -> &mut SpecStylingPolicy {
        &mut self.styling
    }

    pub fn cursor(&self) -> &SpecDocumentCursor {
        self.pager.cursor()
    }

    /// Document written so far.
    pub fn book(&self) -> &SheetBook {
        self.backend.book()
    }

    pub fn backend(&self) -> &dyn DocumentBackend {
        self.backend.as_ref()
    }

    /// Non-blank rows written, title rows included and reserved rows excluded.
    pub fn n_rows_non_blank(&self) -> usize {
        self.cursor().n_rows_non_blank
    }

    /// Pages created.
    pub fn n_sheets(&self) -> usize {
        self.cursor().n_sheets
    }

    /// Non-blank data rows, title rows excluded.
    pub fn n_rows_data(&self) -> usize {
        self.cursor().n_rows_data(self.options().if_write_title)
    }

    /// Snapshot of the session counters and warnings.
    pub fn report(&self) -> SpecExportReport {
        SpecExportReport {
            n_sheets: self.n_sheets(),
            n_rows_non_blank: self.n_rows_non_blank(),
            n_rows_data: self.n_rows_data(),
            ..self.report.clone()
        }
    }

    /// Whether the document has been written out.
    pub fn is_closed(&self) -> bool {
        self.if_closed
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Configuration

    /// Set the exported properties in order. Repeated names are dropped.
    pub fn set_properties<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.properties = derive_unique_properties(properties);
        self
    }

    pub fn set_exclude_properties<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.exclude_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Set the title row texts, parallel to the properties.
    pub fn set_titles<I, S>(&mut self, titles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.titles = titles.into_iter().map(Into::into).collect();
        self
    }

    /// Write `value_true` / `value_false` instead of the booleans of `property`.
    pub fn put_bool_mapping(
        &mut self,
        property: impl Into<String>,
        value_true: impl Into<EnumRecordValue>,
        value_false: impl Into<EnumRecordValue>,
    ) -> &mut Self {
        self.styling
            .put_bool_mapping(property, value_true, value_false);
        self
    }

    /// Date pattern (chrono strftime) of `property`.
    pub fn put_date_format(
        &mut self,
        property: impl Into<String>,
        pattern: impl Into<String>,
    ) -> &mut Self {
        self.styling
            .dict_date_format_by_property
            .insert(property.into(), pattern.into());
        self
    }

    /// Column width of `property` in characters.
    pub fn put_column_width(&mut self, property: impl Into<String>, width: f64) -> &mut Self {
        self.styling
            .dict_width_by_property
            .insert(property.into(), width);
        self
    }

    /// Register a format in the document.
    pub fn create_format(&mut self, fmt: SpecCellFormat) -> SpecFormatHandle {
        self.backend.book_mut().create_format(fmt)
    }

    /// Pooled format `name`, created from `fmt` on first use.
    pub fn register_pooled_format(&mut self, name: &str, fmt: SpecCellFormat) -> SpecFormatHandle {
        register_pooled_format(self.backend.book_mut(), &mut self.dict_fmt_pool, name, fmt)
    }

    pub fn pooled_format(&self, name: &str) -> Option<SpecFormatHandle> {
        self.dict_fmt_pool.get(name).copied()
    }

    /// Callback filling the reserved rows of each new page.
    pub fn set_fn_rows_reserved<F>(&mut self, fn_rows_reserved: F) -> &mut Self
    where
        F: FnMut(&mut SpecSheetScope<'_>) -> SheetExportResult<()> + 'cb,
    {
        self.fn_rows_reserved = Some(Box::new(fn_rows_reserved));
        self
    }

    /// Callback run before each data cell is written.
    pub fn set_fn_cell_value<F>(&mut self, fn_cell_value: F) -> &mut Self
    where
        F: FnMut(
                &str,
                &EnumRecordValue,
                &R,
                &mut SpecCellScope<'_>,
            ) -> SheetExportResult<SpecCellOverride>
            + 'cb,
    {
        self.fn_cell_value = Some(Box::new(fn_cell_value));
        self
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Write

    /// Write a batch of records. Chainable and repeatable.
    ///
    /// The batch is validated before any row is written.
    pub fn write(&mut self, records: &[R]) -> SheetExportResult<&mut Self> {
        self.validate_open()?;

        let mut attributes_first = records.first().map(|record| record.export_attributes());
        let plan = self.validate_data_per_write(attributes_first.as_ref())?;

        // Re-wrapped so the boxed callbacks coerce to the context lifetime.
        let fn_rows_reserved: Option<&mut FnRowsReserved<'_>> =
            match self.fn_rows_reserved.as_deref_mut() {
                Some(fn_rows_reserved) => Some(fn_rows_reserved),
                None => None,
            };
        let fn_cell_value: Option<&mut FnCellValue<'_, R>> =
            match self.fn_cell_value.as_deref_mut() {
                Some(fn_cell_value) => Some(fn_cell_value),
                None => None,
            };
        let mut ctx = SpecPageContext {
            book: self.backend.book_mut(),
            dict_fmt_pool: &mut self.dict_fmt_pool,
            plan: &plan,
            styling: &self.styling,
            fn_rows_reserved,
            fn_cell_value,
        };
        for record in records {
            let attributes = match attributes_first.take() {
                Some(attributes) => attributes,
                None => record.export_attributes(),
            };
            self.pager.write_record(record, &attributes, &mut ctx)?;
        }

        Ok(self)
    }

    /// Write a single record.
    pub fn write_one(&mut self, record: &R) -> SheetExportResult<&mut Self> {
        self.write(std::slice::from_ref(record))
    }

    /// Resolve and validate columns and styling for the next batch.
    pub fn validate_data_per_write(
        &mut self,
        first_record: Option<&SpecRecordAttributes>,
    ) -> SheetExportResult<SpecBatchPlan> {
        let options = self.pager.options().clone();

        let n_properties_given = self.columns.properties.len();
        self.columns.properties =
            derive_unique_properties(std::mem::take(&mut self.columns.properties));
        if self.columns.properties.len() < n_properties_given {
            let c_warning = format!(
                "dropped {} repeated properties.",
                n_properties_given - self.columns.properties.len()
            );
            warn!("{c_warning}");
            self.report.warn(&c_warning);
        }
        resolve_properties(&mut self.columns, first_record)?;

        if options.if_write_title && self.columns.titles.is_empty() {
            self.columns.titles = self.columns.properties.clone();
        }
        if options.if_write_title && self.columns.titles.len() != self.columns.properties.len() {
            return Err(SheetExportError::config(format!(
                "{} titles for {} properties.",
                self.columns.titles.len(),
                self.columns.properties.len()
            )));
        }
        validate_column_count(
            self.columns.properties.len(),
            options.format_kind.n_cols_max(),
        )?;

        for (c_property, mapping) in &self.styling.dict_bool_mapping_by_property {
            validate_bool_substitute(c_property, &mapping.value_true)?;
            validate_bool_substitute(c_property, &mapping.value_false)?;
        }
        parse_date_format(derive_date_format(&options.date_format))?;
        for pattern in self.styling.dict_date_format_by_property.values() {
            parse_date_format(pattern)?;
        }

        ensure_default_formats(
            self.backend.book_mut(),
            &mut self.styling,
            options.if_write_title,
        );

        let columns = self
            .columns
            .properties
            .iter()
            .enumerate()
            .map(|(n_col, c_property)| SpecColumnPlan {
                property: c_property.clone(),
                title: options
                    .if_write_title
                    .then(|| self.columns.titles[n_col].clone()),
                fmt_cell: resolve_cell_format(c_property, &self.styling),
                fmt_title: resolve_title_format(c_property, &self.styling),
                width: resolve_column_width(c_property, &self.styling),
            })
            .collect();
        debug!(
            "Validated batch with {} properties.",
            self.columns.properties.len()
        );

        Ok(SpecBatchPlan {
            columns,
            height_row: self.styling.height_row,
            height_title_row: self.styling.height_title_row,
        })
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region EndWrite

    /// Serialize the document into `sink`. Further writes fail afterwards.
    pub fn end_write(&mut self, sink: &mut dyn Write) -> SheetExportResult<()> {
        self.validate_open()?;
        self.backend.save(sink)?;
        self.if_closed = true;
        debug!(
            "Wrote {:?} document with {} pages.",
            self.backend.format_kind(),
            self.n_sheets()
        );
        Ok(())
    }

    /// Serialize the document into a new file at `path`.
    ///
    /// Failures are logged and reported as `false`. An extension that does
    /// not match the layout is only reported as a warning.
    pub fn end_write_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let format_kind = self.backend.format_kind();
        if let Some(c_ext) = path.extension().and_then(|c_ext| c_ext.to_str())
            && !c_ext.eq_ignore_ascii_case(format_kind.extension())
        {
            let c_warning = format!(
                "{} receives {format_kind:?} content, expected extension .{}.",
                path.display(),
                format_kind.extension()
            );
            warn!("{c_warning}");
            self.report.warn(&c_warning);
        }
        let result = File::create(path)
            .map_err(SheetExportError::from)
            .and_then(|mut file| {
                self.end_write(&mut file)?;
                file.flush()?;
                Ok(())
            });

        match result {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to write {}: {err}", path.display());
                false
            }
        }
    }

    fn validate_open(&self) -> SheetExportResult<()> {
        if self.if_closed {
            return Err(SheetExportError::Closed);
        }
        Ok(())
    }

    // #endregion
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use chrono::NaiveDate;

    use super::*;
    use crate::backend::XlsBackend;
    use crate::conf::EnumFormatKind;
    use crate::spec::EnumCellValue;

    #[derive(Clone)]
    struct SpecOrder {
        id: i64,
        customer: String,
        paid: bool,
        note: Option<String>,
    }

    crate::impl_export_record!(SpecOrder { id, customer, paid, note });

    fn derive_orders(n: i64) -> Vec<SpecOrder> {
        (0..n)
            .map(|i| SpecOrder {
                id: i,
                customer: format!("c{i}"),
                paid: i % 2 == 0,
                note: None,
            })
            .collect()
    }

    fn derive_rows_per_sheet(book: &SheetBook) -> Vec<usize> {
        book.sheets().iter().map(|sheet| sheet.n_rows()).collect()
    }

    #[test]
    fn test_default_session_derives_properties_and_titles() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.write(&derive_orders(3)).unwrap();

        assert_eq!(writer.columns().properties, ["id", "customer", "paid", "note"]);
        assert_eq!(writer.columns().titles, writer.columns().properties);
        assert_eq!(derive_rows_per_sheet(writer.book()), [4]);

        let book = writer.book();
        assert_eq!(
            book.cell(0, 0, 1).unwrap().value,
            EnumCellValue::String("customer".to_string())
        );
        assert_eq!(book.cell(0, 0, 1).unwrap().fmt, writer.styling().fmt_title);
        assert_eq!(book.cell(0, 2, 0).unwrap().value, EnumCellValue::Number(1.0));
        assert_eq!(book.cell(0, 2, 0).unwrap().fmt, writer.styling().fmt_cell);
        assert_eq!(book.sheets()[0].widths.get(&3), Some(&16.0));
    }

    #[test]
    fn test_pagination_tail() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_per_page: 5,
            ..Default::default()
        })
        .unwrap();
        writer.write(&derive_orders(12)).unwrap();

        assert_eq!(derive_rows_per_sheet(writer.book()), [6, 6, 3]);
        assert_eq!(writer.n_sheets(), 3);
        assert_eq!(writer.n_rows_non_blank(), 15);
        assert_eq!(writer.n_rows_data(), 12);
    }

    #[test]
    fn test_batches_continue_on_the_open_page() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_per_page: 4,
            ..Default::default()
        })
        .unwrap();
        let l_orders = derive_orders(6);
        writer
            .write(&l_orders[..3])
            .unwrap()
            .write(&l_orders[3..])
            .unwrap();

        assert_eq!(derive_rows_per_sheet(writer.book()), [5, 3]);
        assert_eq!(writer.report().n_rows_data, 6);
    }

    #[test]
    fn test_blank_record_is_overwritten() {
        let mut writer =
            SheetExportWriter::<SpecRecordAttributes>::new(SpecExportOptions::default()).unwrap();
        writer.set_properties(["a", "b"]);
        let l_records = vec![
            SpecRecordAttributes::new().with("a", 1i64),
            SpecRecordAttributes::new().with("z", 1i64),
            SpecRecordAttributes::new().with("b", "x"),
        ];
        writer.write(&l_records).unwrap();

        assert_eq!(derive_rows_per_sheet(writer.book()), [3]);
        assert_eq!(
            writer.book().cell(0, 2, 1).unwrap().value,
            EnumCellValue::String("x".to_string())
        );
        assert_eq!(writer.n_rows_data(), 2);
    }

    #[test]
    fn test_exclusions_and_explicit_titles() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer
            .set_exclude_properties(["note", "paid"])
            .set_titles(["ID", "Customer"])
            .put_column_width("id", 8.0);
        writer.styling_mut().height_row = Some(20.0);
        writer.write(&derive_orders(1)).unwrap();

        assert_eq!(writer.columns().properties, ["id", "customer"]);
        let sheet = writer.book().sheet(0).unwrap();
        assert_eq!(sheet.widths.get(&0), Some(&8.0));
        assert_eq!(sheet.widths.get(&1), Some(&16.0));
        assert_eq!(sheet.row(1).unwrap().height, Some(20.0));
        assert_eq!(sheet.row(0).unwrap().height, None);
        assert_eq!(
            writer.book().cell(0, 0, 1).unwrap().value,
            EnumCellValue::String("Customer".to_string())
        );
    }

    #[test]
    fn test_title_count_mismatch_fails() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.set_titles(["only one"]);

        assert!(matches!(
            writer.write(&derive_orders(2)),
            Err(SheetExportError::Config(_))
        ));
        assert!(writer.book().sheets().is_empty());
    }

    #[test]
    fn test_repeated_properties_are_dropped_with_warning() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.columns_mut().properties = vec!["id".into(), "id".into(), "paid".into()];
        writer.write(&derive_orders(1)).unwrap();

        assert_eq!(writer.columns().properties, ["id", "paid"]);
        assert_eq!(writer.report().warnings.len(), 1);
    }

    #[test]
    fn test_legacy_column_ceiling_fails_before_writing() {
        let mut writer = SheetExportWriter::<SpecRecordAttributes>::new(SpecExportOptions {
            format_kind: EnumFormatKind::Legacy,
            ..Default::default()
        })
        .unwrap();
        let record: SpecRecordAttributes = (0..300).map(|i| (format!("p{i}"), i as i64)).collect();

        assert!(matches!(
            writer.write(&[record]),
            Err(SheetExportError::Config(_))
        ));
        assert!(writer.book().sheets().is_empty());
        assert_eq!(writer.n_rows_non_blank(), 0);
    }

    #[test]
    fn test_bool_mapping_to_boolean_fails_every_write() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.put_bool_mapping("paid", true, "no");

        assert!(matches!(
            writer.write(&derive_orders(1)),
            Err(SheetExportError::Config(_))
        ));
        assert!(matches!(
            writer.write(&derive_orders(1)),
            Err(SheetExportError::Config(_))
        ));
        assert!(writer.book().sheets().is_empty());
    }

    #[test]
    fn test_bool_mapping_and_date_format() {
        let mut writer =
            SheetExportWriter::<SpecRecordAttributes>::new(SpecExportOptions::default()).unwrap();
        writer
            .put_bool_mapping("paid", "yes", "no")
            .put_date_format("day", "%Y-%m-%d");
        let record = SpecRecordAttributes::new()
            .with("paid", false)
            .with("day", NaiveDate::from_ymd_opt(2023, 7, 4).unwrap());
        writer.write_one(&record).unwrap();

        assert_eq!(
            writer.book().cell(0, 1, 0).unwrap().value,
            EnumCellValue::String("no".to_string())
        );
        assert_eq!(
            writer.book().cell(0, 1, 1).unwrap().value,
            EnumCellValue::String("2023-07-04".to_string())
        );
    }

    #[test]
    fn test_invalid_date_format_fails() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            date_format: "%Y-%Q".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            writer.write(&derive_orders(1)),
            Err(SheetExportError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_options_fail_at_construction() {
        let result = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_reserved: 300,
            ..Default::default()
        });
        assert!(matches!(result, Err(SheetExportError::Config(_))));

        let result = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            format_kind: EnumFormatKind::Legacy,
            rows_per_page: 70_000,
            ..Default::default()
        });
        assert!(matches!(result, Err(SheetExportError::Config(_))));

        let result = SheetExportWriter::<SpecOrder>::with_backend(
            SpecExportOptions::default(),
            Box::new(XlsBackend::new()),
        );
        assert!(matches!(result, Err(SheetExportError::Config(_))));
    }

    #[test]
    fn test_callbacks() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_reserved: 1,
            rows_per_page: 2,
            ..Default::default()
        })
        .unwrap();
        writer.set_properties(["id", "customer"]);
        writer.set_fn_rows_reserved(|scope| {
            let fmt = scope.register_pooled_format(
                "banner",
                SpecCellFormat {
                    bold: Some(true),
                    ..Default::default()
                },
            );
            scope.write_cell(
                0,
                0,
                EnumCellValue::String(format!("page {}", scope.n_sheets())),
                Some(fmt),
            )
        });

        let l_seen = Rc::new(RefCell::new(BTreeMap::new()));
        let l_seen_cb = Rc::clone(&l_seen);
        writer.set_fn_cell_value(move |c_property, value, order: &SpecOrder, scope| {
            l_seen_cb
                .borrow_mut()
                .insert((order.id, c_property.to_string()), value.clone());
            if c_property == "customer" && order.id == 2 {
                let fmt = scope
                    .pooled_format("banner")
                    .unwrap_or_else(|| scope.create_format(SpecCellFormat::default()));
                return Ok(SpecCellOverride::keep().with_value("VIP").with_fmt(fmt));
            }
            Ok(SpecCellOverride::keep())
        });
        writer.write(&derive_orders(3)).unwrap();

        let book = writer.book();
        assert_eq!(derive_rows_per_sheet(book), [4, 3]);
        assert_eq!(
            book.cell(1, 0, 0).unwrap().value,
            EnumCellValue::String("page 2".to_string())
        );
        let cell_vip = book.cell(1, 2, 1).unwrap();
        assert_eq!(cell_vip.value, EnumCellValue::String("VIP".to_string()));
        assert_eq!(cell_vip.fmt, writer.pooled_format("banner"));
        assert_eq!(l_seen.borrow().len(), 6);
        assert_eq!(
            l_seen.borrow().get(&(2, "customer".to_string())),
            Some(&EnumRecordValue::String("c2".to_string()))
        );
    }

    #[test]
    fn test_end_write_closes_session() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.write(&derive_orders(2)).unwrap();

        let mut v_bytes = Vec::new();
        writer.end_write(&mut v_bytes).unwrap();
        assert!(v_bytes.starts_with(b"PK"));
        assert!(writer.is_closed());
        assert!(matches!(
            writer.write(&derive_orders(1)),
            Err(SheetExportError::Closed)
        ));
        assert!(matches!(
            writer.end_write(&mut Vec::<u8>::new()),
            Err(SheetExportError::Closed)
        ));
    }

    #[test]
    fn test_end_write_file_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.xls");
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            format_kind: EnumFormatKind::Legacy,
            ..Default::default()
        })
        .unwrap();
        writer.write(&derive_orders(5)).unwrap();

        assert!(writer.end_write_file(&path));
        let v_bytes = std::fs::read(&path).unwrap();
        assert!(v_bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]));
    }

    #[test]
    fn test_end_write_file_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.xlsx");
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.write(&derive_orders(1)).unwrap();

        assert!(!writer.end_write_file(&path));
        assert!(!writer.is_closed());
    }

    #[test]
    fn test_long_sheet_names_stay_unique() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            sheet_name: format!("{}1", "A".repeat(29)),
            rows_per_page: 1,
            if_write_title: false,
            ..Default::default()
        })
        .unwrap();
        writer.write(&derive_orders(11)).unwrap();

        let l_names: Vec<&str> = writer
            .book()
            .sheets()
            .iter()
            .map(|sheet| sheet.name.as_str())
            .collect();
        let set_names: std::collections::BTreeSet<&str> = l_names.iter().copied().collect();
        assert_eq!(l_names.len(), 11);
        assert_eq!(set_names.len(), 11);
        assert_eq!(l_names[0], format!("{}11", "A".repeat(29)));
        assert_eq!(l_names[10], format!("{}__2", "A".repeat(28)));
        assert!(writer.end_write(&mut Vec::<u8>::new()).is_ok());
    }

    #[test]
    fn test_reserved_callback_skipped_without_reserved_rows() {
        let n_calls = Cell::new(0usize);
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_per_page: 1,
            ..Default::default()
        })
        .unwrap();
        writer.set_fn_rows_reserved(|_scope| {
            n_calls.set(n_calls.get() + 1);
            Ok(())
        });
        writer.write(&derive_orders(3)).unwrap();

        assert_eq!(writer.n_sheets(), 3);
        drop(writer);
        assert_eq!(n_calls.get(), 0);
    }

    #[test]
    fn test_cell_callback_error_aborts_write() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.set_fn_cell_value(|_c_property, _value, order: &SpecOrder, _scope| {
            if order.id == 2 {
                return Err(SheetExportError::config("order 2 is not exportable."));
            }
            Ok(SpecCellOverride::keep())
        });

        assert!(matches!(
            writer.write(&derive_orders(4)),
            Err(SheetExportError::Config(_))
        ));
        assert_eq!(writer.n_rows_non_blank(), 2);
    }

    #[test]
    fn test_reserved_callback_error_aborts_write() {
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            rows_reserved: 2,
            ..Default::default()
        })
        .unwrap();
        writer.set_fn_rows_reserved(|_scope| Err(SheetExportError::config("no banner.")));

        assert!(matches!(
            writer.write(&derive_orders(3)),
            Err(SheetExportError::Config(_))
        ));
        assert_eq!(writer.n_sheets(), 1);
        assert_eq!(derive_rows_per_sheet(writer.book()), [0]);
        assert_eq!(writer.n_rows_non_blank(), 0);
    }

    #[test]
    fn test_callbacks_borrow_local_state() {
        let dict_customer_labels: BTreeMap<i64, String> =
            [(1, "Acme".to_string())].into_iter().collect();
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions::default()).unwrap();
        writer.set_properties(["id", "customer"]);
        writer.set_fn_cell_value(|c_property, _value, order: &SpecOrder, _scope| {
            match dict_customer_labels.get(&order.id) {
                Some(c_label) if c_property == "customer" => {
                    Ok(SpecCellOverride::keep().with_value(c_label.as_str()))
                }
                _ => Ok(SpecCellOverride::keep()),
            }
        });
        writer.write(&derive_orders(2)).unwrap();

        assert_eq!(
            writer.book().cell(0, 2, 1).unwrap().value,
            EnumCellValue::String("Acme".to_string())
        );
        assert_eq!(
            writer.book().cell(0, 1, 1).unwrap().value,
            EnumCellValue::String("c0".to_string())
        );
    }

    #[test]
    fn test_end_write_file_warns_on_extension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.xlsx");
        let mut writer = SheetExportWriter::<SpecOrder>::new(SpecExportOptions {
            format_kind: EnumFormatKind::Legacy,
            ..Default::default()
        })
        .unwrap();
        writer.write(&derive_orders(2)).unwrap();

        assert!(writer.end_write_file(&path));
        let report = writer.report();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].ends_with("expected extension .xls."));
        assert!(std::fs::read(&path).unwrap().starts_with(&[0xD0, 0xCF, 0x11, 0xE0]));
    }
}
