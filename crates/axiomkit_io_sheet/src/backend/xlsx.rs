//! Modern workbook backend rendered through `rust_xlsxwriter`.

use std::io::Write;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::backend::DocumentBackend;
use crate::book::SheetBook;
use crate::conf::EnumFormatKind;
use crate::error::SheetExportResult;
use crate::spec::{EnumCellValue, SpecCellFormat};

/// `.xlsx` backend. The book is buffered in memory until `save`.
#[derive(Debug, Default)]
pub struct XlsxBackend {
    book: SheetBook,
}

impl XlsxBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a `rust_xlsxwriter` workbook mirroring the current book.
    pub fn derive_workbook(&self) -> SheetExportResult<Workbook> {
        let mut workbook = Workbook::new();
        let l_formats: Vec<Format> = self
            .book
            .formats()
            .iter()
            .map(derive_rust_xlsx_format)
            .collect();

        for sheet in self.book.sheets() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.name.as_str())?;

            for (n_col, width) in &sheet.widths {
                worksheet.set_column_width(*n_col, *width)?;
            }
            for (n_row, row) in &sheet.rows {
                if let Some(height) = row.height {
                    worksheet.set_row_height(*n_row, height)?;
                }
                for (n_col, cell) in &row.cells {
                    let format = cell.fmt.and_then(|fmt| l_formats.get(fmt.index()));
                    write_cell_with_format(worksheet, *n_row, *n_col, &cell.value, format)?;
                }
            }
        }

        Ok(workbook)
    }
}

impl DocumentBackend for XlsxBackend {
    fn format_kind(&self) -> EnumFormatKind {
        EnumFormatKind::Modern
    }

    fn book(&self) -> &SheetBook {
        &self.book
    }

    fn book_mut(&mut self) -> &mut SheetBook {
        &mut self.book
    }

    fn save(&self, sink: &mut dyn Write) -> SheetExportResult<()> {
        let v_bytes = self.derive_workbook()?.save_to_buffer()?;
        sink.write_all(&v_bytes)?;
        Ok(())
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> SheetExportResult<()> {
    match (value, format) {
        // Empty text is stored as a formatted blank, or not at all.
        (EnumCellValue::String(val), Some(format)) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        (EnumCellValue::String(val), None) if val.is_empty() => {}
        (EnumCellValue::String(val), Some(format)) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        (EnumCellValue::String(val), None) => {
            worksheet.write_string(n_row, n_col, val)?;
        }
        (EnumCellValue::Number(val), Some(format)) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        (EnumCellValue::Number(val), None) => {
            worksheet.write_number(n_row, n_col, *val)?;
        }
        (EnumCellValue::Boolean(val), Some(format)) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
        (EnumCellValue::Boolean(val), None) => {
            worksheet.write_boolean(n_row, n_col, *val)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    for val in [&spec.align, &spec.valign].into_iter().flatten() {
        if let Some(align) = derive_format_align(val) {
            format = format.set_align(align);
        }
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}
