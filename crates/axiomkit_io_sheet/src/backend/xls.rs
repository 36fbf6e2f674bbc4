//! Legacy workbook backend: BIFF8 `Workbook` stream in an OLE compound file.
//!
//! Layout of the stream:
//! - globals: BOF, CODEPAGE, DATE1904, WINDOW1, FONT*, FORMAT*, XF*, STYLE,
//!   BOUNDSHEET*, EOF
//! - per sheet: BOF, COLINFO*, DIMENSIONS, ROW*, LABEL/NUMBER/BOOLERR*,
//!   WINDOW2, EOF
//!
//! Text is written inline with LABEL records, so no shared string table is
//! emitted.

use std::io::{Cursor, Write};

use log::warn;

use crate::backend::DocumentBackend;
use crate::book::{SheetBook, SpecSheet};
use crate::conf::{EnumFormatKind, N_NROWS_XLS_MAX};
use crate::error::{SheetExportError, SheetExportResult};
use crate::spec::{EnumCellValue, SpecCellFormat, SpecFormatHandle};

const N_LEN_RECORD_MAX: usize = 8224;
const N_LEN_STREAM_MIN: usize = 4096;
const N_CODEPAGE_UTF16: u16 = 0x04B0;
const N_SUBSTREAM_WORKBOOK: u16 = 0x0005;
const N_SUBSTREAM_WORKSHEET: u16 = 0x0010;
const N_XF_STYLE_COUNT: u16 = 15;
const N_XF_CELL_DEFAULT: u16 = 15;
const N_FMT_CUSTOM_FIRST: u16 = 164;
const N_FONT_HEIGHT_DEFAULT: u16 = 200;
const N_FONT_WEIGHT_NORMAL: u16 = 400;
const N_FONT_WEIGHT_BOLD: u16 = 700;
const N_COLOR_AUTO: u16 = 0x7FFF;
const N_COLOR_BORDER: u16 = 0x0008;
const N_COLOR_FILL_BG: u16 = 0x0041;
const N_ROW_HEIGHT_DEFAULT: u16 = 0x00FF;
const C_FONT_NAME_DEFAULT: &str = "Arial";

/// Default palette entries a color string can map to.
const TUP_PALETTE: [(u16, u32); 16] = [
    (0x08, 0x000000),
    (0x09, 0xFFFFFF),
    (0x0A, 0xFF0000),
    (0x0B, 0x00FF00),
    (0x0C, 0x0000FF),
    (0x0D, 0xFFFF00),
    (0x0E, 0xFF00FF),
    (0x0F, 0x00FFFF),
    (0x10, 0x800000),
    (0x11, 0x008000),
    (0x12, 0x000080),
    (0x13, 0x808000),
    (0x14, 0x800080),
    (0x15, 0x008080),
    (0x16, 0xC0C0C0),
    (0x17, 0x808080),
];

/// Built-in number formats addressable without a FORMAT record.
const TUP_NUM_FORMAT_BUILTIN: [(&str, u16); 9] = [
    ("General", 0),
    ("0", 1),
    ("0.00", 2),
    ("#,##0", 3),
    ("#,##0.00", 4),
    ("0%", 9),
    ("0.00%", 10),
    ("0.00E+00", 11),
    ("@", 49),
];

/// `.xls` backend. The book is buffered in memory until `save`.
#[derive(Debug, Default)]
pub struct XlsBackend {
    book: SheetBook,
}

impl XlsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the BIFF8 `Workbook` stream of the current book.
    pub fn derive_workbook_stream(&self) -> SheetExportResult<Vec<u8>> {
        let table = SpecBiffFormatTable::from_formats(self.book.formats());

        let sheet_placeholder = SpecSheet {
            name: "Sheet1".to_string(),
            ..Default::default()
        };
        let mut l_sheets: Vec<&SpecSheet> = self.book.sheets().iter().collect();
        if l_sheets.is_empty() {
            l_sheets.push(&sheet_placeholder);
        }

        let mut stream = Vec::new();

        // #region Globals
        write_bof(&mut stream, N_SUBSTREAM_WORKBOOK)?;
        write_record(&mut stream, 0x0042, &N_CODEPAGE_UTF16.to_le_bytes())?;
        write_record(&mut stream, 0x0022, &0u16.to_le_bytes())?;
        write_window1(&mut stream)?;
        table.write_fonts(&mut stream)?;
        table.write_number_formats(&mut stream)?;
        table.write_xfs(&mut stream)?;
        write_style_normal(&mut stream)?;

        let mut l_pos_boundsheet = Vec::with_capacity(l_sheets.len());
        for sheet in &l_sheets {
            l_pos_boundsheet.push(stream.len());
            write_boundsheet(&mut stream, &sheet.name)?;
        }
        write_record(&mut stream, 0x000A, &[])?;
        // #endregion

        for (sheet, n_pos_boundsheet) in l_sheets.iter().zip(l_pos_boundsheet) {
            let n_pos_bof = u32::try_from(stream.len())
                .map_err(|_| SheetExportError::Biff("workbook stream exceeds 4 GiB.".to_string()))?;
            // Stream offset field follows the 4-byte record header.
            stream[n_pos_boundsheet + 4..n_pos_boundsheet + 8]
                .copy_from_slice(&n_pos_bof.to_le_bytes());
            write_sheet(&mut stream, sheet, &table)?;
        }

        if stream.len() < N_LEN_STREAM_MIN {
            stream.resize(N_LEN_STREAM_MIN, 0);
        }
        Ok(stream)
    }
}

impl DocumentBackend for XlsBackend {
    fn format_kind(&self) -> EnumFormatKind {
        EnumFormatKind::Legacy
    }

    fn book(&self) -> &SheetBook {
        &self.book
    }

    fn book_mut(&mut self) -> &mut SheetBook {
        &mut self.book
    }

    fn save(&self, sink: &mut dyn Write) -> SheetExportResult<()> {
        let stream = self.derive_workbook_stream()?;

        let mut ole = cfb::CompoundFile::create(Cursor::new(Vec::new()))?;
        ole.create_stream("/Workbook")?.write_all(&stream)?;
        ole.flush()?;

        sink.write_all(&ole.into_inner().into_inner())?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region FormatTable

#[derive(Debug, Clone, PartialEq)]
struct SpecBiffFont {
    name: String,
    n_height: u16,
    n_weight: u16,
    if_italic: bool,
    n_color: u16,
}

impl Default for SpecBiffFont {
    fn default() -> Self {
        Self {
            name: C_FONT_NAME_DEFAULT.to_string(),
            n_height: N_FONT_HEIGHT_DEFAULT,
            n_weight: N_FONT_WEIGHT_NORMAL,
            if_italic: false,
            n_color: N_COLOR_AUTO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct SpecBiffXf {
    n_font: u16,
    n_num_format: u16,
    n_align_h: u8,
    n_align_v: u8,
    if_wrap: bool,
    n_border: u16,
    n_fill_color: Option<u16>,
}

/// Fonts, number formats and cell XFs derived from the book formats.
///
/// Book format `i` is written as cell XF `16 + i`.
#[derive(Debug, Default)]
struct SpecBiffFormatTable {
    l_fonts: Vec<SpecBiffFont>,
    l_num_formats: Vec<(u16, String)>,
    l_xfs: Vec<SpecBiffXf>,
}

impl SpecBiffFormatTable {
    fn from_formats(formats: &[SpecCellFormat]) -> Self {
        let mut table = Self {
            l_fonts: vec![
                SpecBiffFont::default(),
                SpecBiffFont {
                    n_weight: N_FONT_WEIGHT_BOLD,
                    ..Default::default()
                },
                SpecBiffFont {
                    if_italic: true,
                    ..Default::default()
                },
                SpecBiffFont {
                    n_weight: N_FONT_WEIGHT_BOLD,
                    if_italic: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        for fmt in formats {
            let xf = table.derive_xf(fmt);
            table.l_xfs.push(xf);
        }
        table
    }

    fn derive_xf(&mut self, fmt: &SpecCellFormat) -> SpecBiffXf {
        let font = SpecBiffFont {
            name: fmt
                .font_name
                .clone()
                .unwrap_or_else(|| C_FONT_NAME_DEFAULT.to_string()),
            n_height: fmt
                .font_size
                .map_or(N_FONT_HEIGHT_DEFAULT, |n| (n.clamp(1, 409) * 20) as u16),
            n_weight: if fmt.bold.unwrap_or(false) {
                N_FONT_WEIGHT_BOLD
            } else {
                N_FONT_WEIGHT_NORMAL
            },
            if_italic: fmt.italic.unwrap_or(false),
            n_color: fmt
                .font_color
                .as_deref()
                .and_then(derive_palette_index)
                .unwrap_or(N_COLOR_AUTO),
        };

        SpecBiffXf {
            n_font: self.intern_font(font),
            n_num_format: fmt
                .num_format
                .as_deref()
                .map_or(0, |pattern| self.intern_num_format(pattern)),
            n_align_h: fmt.align.as_deref().and_then(derive_align_h).unwrap_or(0),
            n_align_v: fmt.valign.as_deref().and_then(derive_align_v).unwrap_or(2),
            if_wrap: fmt.text_wrap.unwrap_or(false),
            n_border: fmt.border.map_or(0, |n| n.clamp(0, 13) as u16),
            n_fill_color: fmt.bg_color.as_deref().and_then(derive_palette_index),
        }
    }

    /// BIFF font index of `font`; index 4 is never assigned.
    fn intern_font(&mut self, font: SpecBiffFont) -> u16 {
        let n_pos = match self.l_fonts.iter().position(|f| *f == font) {
            Some(n_pos) => n_pos,
            None => {
                self.l_fonts.push(font);
                self.l_fonts.len() - 1
            }
        };
        let n_idx = if n_pos >= 4 { n_pos + 1 } else { n_pos };
        n_idx as u16
    }

    fn intern_num_format(&mut self, pattern: &str) -> u16 {
        if let Some((_, n_idx)) = TUP_NUM_FORMAT_BUILTIN
            .iter()
            .find(|(c_builtin, _)| *c_builtin == pattern)
        {
            return *n_idx;
        }
        if let Some((n_idx, _)) = self.l_num_formats.iter().find(|(_, c)| c == pattern) {
            return *n_idx;
        }
        let n_idx = N_FMT_CUSTOM_FIRST + self.l_num_formats.len() as u16;
        self.l_num_formats.push((n_idx, pattern.to_string()));
        n_idx
    }

    fn cell_xf_index(&self, fmt: Option<SpecFormatHandle>) -> u16 {
        match fmt {
            Some(fmt) if fmt.index() < self.l_xfs.len() => {
                N_XF_CELL_DEFAULT + 1 + fmt.index() as u16
            }
            _ => N_XF_CELL_DEFAULT,
        }
    }

    fn write_fonts<W: Write>(&self, writer: &mut W) -> SheetExportResult<()> {
        for font in &self.l_fonts {
            let mut payload = Vec::with_capacity(16 + font.name.len());
            payload.extend_from_slice(&font.n_height.to_le_bytes());
            let n_flags: u16 = if font.if_italic { 0x0002 } else { 0 };
            payload.extend_from_slice(&n_flags.to_le_bytes());
            payload.extend_from_slice(&font.n_color.to_le_bytes());
            payload.extend_from_slice(&font.n_weight.to_le_bytes());
            // escapement, underline, family, charset, reserved
            payload.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
            write_short_unicode_string(&mut payload, &font.name);
            write_record(writer, 0x0031, &payload)?;
        }
        Ok(())
    }

    fn write_number_formats<W: Write>(&self, writer: &mut W) -> SheetExportResult<()> {
        for (n_idx, pattern) in &self.l_num_formats {
            let mut payload = Vec::new();
            payload.extend_from_slice(&n_idx.to_le_bytes());
            write_unicode_string(&mut payload, pattern, N_LEN_RECORD_MAX - 2);
            write_record(writer, 0x041E, &payload)?;
        }
        Ok(())
    }

    fn write_xfs<W: Write>(&self, writer: &mut W) -> SheetExportResult<()> {
        let xf_default = SpecBiffXf {
            n_align_v: 2,
            ..Default::default()
        };
        for _ in 0..N_XF_STYLE_COUNT {
            write_xf(writer, &xf_default, true)?;
        }
        write_xf(writer, &xf_default, false)?;
        for xf in &self.l_xfs {
            write_xf(writer, xf, false)?;
        }
        Ok(())
    }
}

fn derive_align_h(align: &str) -> Option<u8> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(0),
        "left" => Some(1),
        "center" => Some(2),
        "right" => Some(3),
        "fill" => Some(4),
        "justify" => Some(5),
        "center_across" => Some(6),
        "distributed" => Some(7),
        _ => None,
    }
}

fn derive_align_v(align: &str) -> Option<u8> {
    match align.trim().to_ascii_lowercase().as_str() {
        "top" => Some(0),
        "vcenter" | "vertical_center" => Some(1),
        "bottom" => Some(2),
        "vjustify" | "vertical_justify" => Some(3),
        "vdistributed" | "vertical_distributed" => Some(4),
        _ => None,
    }
}

/// Nearest default-palette index of a `#RRGGBB` color or a basic color name.
fn derive_palette_index(color: &str) -> Option<u16> {
    let c_color = color.trim().to_ascii_lowercase();
    let n_rgb = match c_color.as_str() {
        "black" => 0x000000,
        "white" => 0xFFFFFF,
        "red" => 0xFF0000,
        "green" => 0x008000,
        "lime" => 0x00FF00,
        "blue" => 0x0000FF,
        "yellow" => 0xFFFF00,
        "magenta" | "purple" => 0xFF00FF,
        "cyan" => 0x00FFFF,
        "navy" => 0x000080,
        "silver" => 0xC0C0C0,
        "gray" | "grey" => 0x808080,
        _ => {
            let c_hex = c_color.strip_prefix('#').unwrap_or(&c_color);
            if c_hex.len() != 6 {
                return None;
            }
            u32::from_str_radix(c_hex, 16).ok()?
        }
    };

    let split = |n: u32| {
        [
            ((n >> 16) & 0xFF) as i64,
            ((n >> 8) & 0xFF) as i64,
            (n & 0xFF) as i64,
        ]
    };
    let l_target = split(n_rgb);
    TUP_PALETTE
        .iter()
        .min_by_key(|(_, n_entry)| {
            split(*n_entry)
                .iter()
                .zip(l_target)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<i64>()
        })
        .map(|(n_idx, _)| *n_idx)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

fn write_record<W: Write>(writer: &mut W, n_type: u16, payload: &[u8]) -> SheetExportResult<()> {
    if payload.len() > N_LEN_RECORD_MAX {
        return Err(SheetExportError::Biff(format!(
            "record 0x{n_type:04X} payload of {} bytes exceeds {N_LEN_RECORD_MAX}.",
            payload.len()
        )));
    }
    writer.write_all(&n_type.to_le_bytes())?;
    writer.write_all(&(payload.len() as u16).to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

fn write_bof<W: Write>(writer: &mut W, n_substream: u16) -> SheetExportResult<()> {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&0x0600u16.to_le_bytes());
    payload.extend_from_slice(&n_substream.to_le_bytes());
    payload.extend_from_slice(&0x0DBBu16.to_le_bytes());
    payload.extend_from_slice(&0x07CCu16.to_le_bytes());
    payload.extend_from_slice(&0u32.to_le_bytes());
    payload.extend_from_slice(&6u32.to_le_bytes());
    write_record(writer, 0x0809, &payload)
}

fn write_window1<W: Write>(writer: &mut W) -> SheetExportResult<()> {
    let mut payload = Vec::with_capacity(18);
    for n in [0u16, 0, 0x3000, 0x1E00, 0x0038, 0, 0, 1, 0x0258] {
        payload.extend_from_slice(&n.to_le_bytes());
    }
    write_record(writer, 0x003D, &payload)
}

fn write_xf<W: Write>(writer: &mut W, xf: &SpecBiffXf, if_style: bool) -> SheetExportResult<()> {
    let mut payload = Vec::with_capacity(20);
    payload.extend_from_slice(&xf.n_font.to_le_bytes());
    payload.extend_from_slice(&xf.n_num_format.to_le_bytes());
    let n_type: u16 = if if_style { 0xFFF5 } else { 0x0001 };
    payload.extend_from_slice(&n_type.to_le_bytes());

    let mut n_align = (xf.n_align_h & 0x07) | ((xf.n_align_v & 0x07) << 4);
    if xf.if_wrap {
        n_align |= 0x08;
    }
    payload.push(n_align);
    payload.push(0); // rotation
    payload.push(0); // indent
    payload.push(if if_style { 0x00 } else { 0xFC }); // used attributes

    let n_line = xf.n_border & 0x000F;
    let n_border_styles = n_line | (n_line << 4) | (n_line << 8) | (n_line << 12);
    payload.extend_from_slice(&n_border_styles.to_le_bytes());

    let n_border_color = if n_line > 0 { N_COLOR_BORDER } else { 0 };
    let n_palette_lr = n_border_color | (n_border_color << 7);
    payload.extend_from_slice(&n_palette_lr.to_le_bytes());

    let n_pattern: u32 = if xf.n_fill_color.is_some() { 1 } else { 0 };
    let n_palette_tb =
        (n_border_color as u32) | ((n_border_color as u32) << 7) | (n_pattern << 26);
    payload.extend_from_slice(&n_palette_tb.to_le_bytes());

    let n_fill_fg = xf.n_fill_color.unwrap_or(0x0040) & 0x007F;
    let n_fill = n_fill_fg | (N_COLOR_FILL_BG << 7);
    payload.extend_from_slice(&n_fill.to_le_bytes());

    write_record(writer, 0x00E0, &payload)
}

fn write_style_normal<W: Write>(writer: &mut W) -> SheetExportResult<()> {
    let n_xf: u16 = 0x8000;
    let mut payload = n_xf.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0x00, 0xFF]);
    write_record(writer, 0x0293, &payload)
}

/// Stream offset is patched once the sheet substream position is known.
fn write_boundsheet<W: Write>(writer: &mut W, name: &str) -> SheetExportResult<()> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    write_short_unicode_string(&mut payload, name);
    write_record(writer, 0x0085, &payload)
}

fn write_sheet<W: Write>(
    writer: &mut W,
    sheet: &SpecSheet,
    table: &SpecBiffFormatTable,
) -> SheetExportResult<()> {
    write_bof(writer, N_SUBSTREAM_WORKSHEET)?;

    for (n_col, width) in &sheet.widths {
        let n_width = (width.clamp(0.0, 255.0) * 256.0) as u16;
        let mut payload = Vec::with_capacity(12);
        for n in [*n_col, *n_col, n_width, N_XF_CELL_DEFAULT, 0, 0] {
            payload.extend_from_slice(&n.to_le_bytes());
        }
        write_record(writer, 0x007D, &payload)?;
    }

    let (n_row_first, n_row_last, n_col_first, n_col_last) = sheet.dimensions();
    if n_row_last as usize > N_NROWS_XLS_MAX {
        return Err(SheetExportError::Biff(format!(
            "sheet {:?} has {n_row_last} rows, more than {N_NROWS_XLS_MAX}.",
            sheet.name
        )));
    }
    let mut payload = Vec::with_capacity(14);
    payload.extend_from_slice(&n_row_first.to_le_bytes());
    payload.extend_from_slice(&n_row_last.to_le_bytes());
    payload.extend_from_slice(&n_col_first.to_le_bytes());
    payload.extend_from_slice(&n_col_last.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    write_record(writer, 0x0200, &payload)?;

    for (n_row, row) in &sheet.rows {
        let n_col_mic = row.cells.keys().next().copied().unwrap_or(0);
        let n_col_mac = row
            .cells
            .keys()
            .next_back()
            .map_or(0, |n_col| n_col.saturating_add(1));
        let (n_height, n_flags) = match row.height {
            Some(height) => ((height.clamp(0.0, 409.0) * 20.0) as u16, 0x0140u16),
            None => (N_ROW_HEIGHT_DEFAULT, 0x0100u16),
        };
        let mut payload = Vec::with_capacity(16);
        for n in [
            *n_row as u16,
            n_col_mic,
            n_col_mac,
            n_height,
            0,
            0,
            n_flags,
            N_XF_CELL_DEFAULT,
        ] {
            payload.extend_from_slice(&n.to_le_bytes());
        }
        write_record(writer, 0x0208, &payload)?;
    }

    for (n_row, row) in &sheet.rows {
        for (n_col, cell) in &row.cells {
            let n_xf = table.cell_xf_index(cell.fmt);
            let mut payload = Vec::with_capacity(16);
            payload.extend_from_slice(&(*n_row as u16).to_le_bytes());
            payload.extend_from_slice(&n_col.to_le_bytes());
            payload.extend_from_slice(&n_xf.to_le_bytes());
            let n_type = match &cell.value {
                EnumCellValue::String(val) => {
                    if write_unicode_string(&mut payload, val, N_LEN_RECORD_MAX - 6) {
                        warn!(
                            "Truncated text at sheet {:?} row {} column {} to fit one BIFF record.",
                            sheet.name, n_row, n_col
                        );
                    }
                    0x0204
                }
                EnumCellValue::Number(val) => {
                    payload.extend_from_slice(&val.to_le_bytes());
                    0x0203
                }
                EnumCellValue::Boolean(val) => {
                    payload.extend_from_slice(&[u8::from(*val), 0]);
                    0x0205
                }
            };
            write_record(writer, n_type, &payload)?;
        }
    }

    let mut payload = Vec::with_capacity(18);
    for n in [0x06B6u16, 0, 0, 0x0040, 0, 0, 0, 0, 0] {
        payload.extend_from_slice(&n.to_le_bytes());
    }
    write_record(writer, 0x023E, &payload)?;

    write_record(writer, 0x000A, &[])
}

/// Append an 8-bit-length string (sheet and font names, at most 255 chars).
fn write_short_unicode_string(payload: &mut Vec<u8>, text: &str) {
    let l_units: Vec<u16> = text.encode_utf16().take(255).collect();
    payload.push(l_units.len() as u8);
    append_string_units(payload, &l_units);
}

/// Append a 16-bit-length string within `n_len_max` bytes.
///
/// Returns whether the text had to be truncated.
fn write_unicode_string(payload: &mut Vec<u8>, text: &str, n_len_max: usize) -> bool {
    let l_units: Vec<u16> = text.encode_utf16().collect();
    let n_width = if l_units.iter().all(|n| *n <= 0xFF) { 1 } else { 2 };
    let n_units_max = (n_len_max.saturating_sub(3) / n_width).min(u16::MAX as usize);

    let mut n_units = l_units.len().min(n_units_max);
    // Never split a surrogate pair.
    if n_units < l_units.len() && n_units > 0 && (0xD800..0xDC00).contains(&l_units[n_units - 1]) {
        n_units -= 1;
    }

    payload.extend_from_slice(&(n_units as u16).to_le_bytes());
    append_string_units(payload, &l_units[..n_units]);
    n_units < l_units.len()
}

fn append_string_units(payload: &mut Vec<u8>, l_units: &[u16]) {
    if l_units.iter().all(|n| *n <= 0xFF) {
        payload.push(0x00);
        payload.extend(l_units.iter().map(|n| *n as u8));
    } else {
        payload.push(0x01);
        for n in l_units {
            payload.extend_from_slice(&n.to_le_bytes());
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
