//! `axiomkit_io_sheet` v1:
//! Paginated record-to-spreadsheet export engine.
//!
//! Module layout:
//! - `conf`      : constants, format ceilings and default presets
//! - `spec`      : specs/models/options
//! - `error`     : error type
//! - `util`      : pure helper functions
//! - `record`    : record capability and attribute resolution
//! - `value`     : attribute value to cell value coercion
//! - `style`     : per-attribute formats/widths and the format pool
//! - `book`      : in-memory document model
//! - `backend`   : `.xlsx` / `.xls` renderers of the document model
//! - `row`       : one record to one row
//! - `pager`     : page rollover and the row cursor
//! - `writer`    : export session
//! - `dataframe` : Polars frames as a record source
pub mod backend;
pub mod book;
pub mod conf;
pub mod dataframe;
pub mod error;
pub mod pager;
pub mod record;
pub mod row;
pub mod spec;
pub mod style;
pub mod util;
pub mod value;
pub mod writer;

pub use backend::{DocumentBackend, XlsBackend, XlsxBackend, derive_backend};
pub use book::{SheetBook, SpecCell, SpecRow, SpecSheet};
pub use conf::{
    C_DATE_FORMAT_DEFAULT, C_SHEET_NAME_DEFAULT, EnumFormatKind, N_ROWS_RESERVED_MAX,
};
pub use dataframe::{derive_records_from_dataframe, derive_records_from_ipc_bytes};
pub use error::{SheetExportError, SheetExportResult};
pub use pager::{FnRowsReserved, SheetPager, SpecDocumentCursor, SpecSheetScope};
pub use record::{ExportRecord, SpecRecordAttributes};
pub use row::{FnCellValue, SpecCellScope};
pub use spec::{
    EnumCellValue, EnumRecordValue, SpecBoolMapping, SpecCellFormat, SpecCellOverride,
    SpecExportColumns, SpecExportOptions, SpecExportReport, SpecFormatHandle, SpecStylingPolicy,
    SpecValuePolicy,
};
pub use writer::SheetExportWriter;
