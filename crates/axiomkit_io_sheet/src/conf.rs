//! Sheet export constants and default preset factories.

use crate::spec::SpecCellFormat;

/// Modern (`.xlsx`) worksheet maximum row count.
pub const N_NROWS_XLSX_MAX: usize = 1_048_576;
/// Modern (`.xlsx`) worksheet maximum column count.
pub const N_NCOLS_XLSX_MAX: usize = 16_384;
/// Legacy (`.xls`) worksheet maximum row count.
pub const N_NROWS_XLS_MAX: usize = 65_535;
/// Legacy (`.xls`) worksheet maximum column count.
pub const N_NCOLS_XLS_MAX: usize = 256;
/// Maximum number of reserved rows on top of every page.
pub const N_ROWS_RESERVED_MAX: usize = 256;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Default date pattern (`yyyy/MM/dd HH:mm:ss`).
pub const C_DATE_FORMAT_DEFAULT: &str = "%Y/%m/%d %H:%M:%S";
/// Default page name prefix; pages are named `Sheet1`, `Sheet2`, ...
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet";
/// Default column width in characters.
pub const N_WIDTH_COLUMN_DEFAULT: f64 = 16.0;
/// Font size of the default title format.
pub const N_FONT_SIZE_TITLE: i64 = 16;

/// Spreadsheet binary layout. Fixes the per-page row/column ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumFormatKind {
    /// BIFF8 `.xls` workbook.
    Legacy,
    /// Office Open XML `.xlsx` workbook.
    #[default]
    Modern,
}

impl EnumFormatKind {
    /// Maximum rows per worksheet, 1-based.
    pub fn n_rows_max(self) -> usize {
        match self {
            Self::Legacy => N_NROWS_XLS_MAX,
            Self::Modern => N_NROWS_XLSX_MAX,
        }
    }

    /// Maximum columns per worksheet, 1-based.
    pub fn n_cols_max(self) -> usize {
        match self {
            Self::Legacy => N_NCOLS_XLS_MAX,
            Self::Modern => N_NCOLS_XLSX_MAX,
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Legacy => "xls",
            Self::Modern => "xlsx",
        }
    }
}

/// Build the default data cell format (centered both ways).
pub fn derive_default_cell_format() -> SpecCellFormat {
    SpecCellFormat {
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}

/// Build the default title cell format (centered, bold, larger font).
pub fn derive_default_title_format() -> SpecCellFormat {
    derive_default_cell_format().with_(SpecCellFormat {
        bold: Some(true),
        font_size: Some(N_FONT_SIZE_TITLE),
        ..Default::default()
    })
}
