//! Document backends: render a [`SheetBook`] into a spreadsheet file layout.
//!
//! - `xlsx` : modern Office Open XML workbook via `rust_xlsxwriter`
//! - `xls`  : legacy BIFF8 workbook inside an OLE compound file

use std::io::Write;

use crate::book::SheetBook;
use crate::conf::EnumFormatKind;
use crate::error::SheetExportResult;

pub mod xls;
pub mod xlsx;

pub use xls::XlsBackend;
pub use xlsx::XlsxBackend;

/// A spreadsheet document the export engine writes into.
///
/// The engine only touches the shared [`SheetBook`]; the backend decides how
/// the finished book is laid out on `save`.
pub trait DocumentBackend {
    /// Layout written by this backend.
    fn format_kind(&self) -> EnumFormatKind;

    /// Document model being built.
    fn book(&self) -> &SheetBook;

    /// Mutable document model being built.
    fn book_mut(&mut self) -> &mut SheetBook;

    /// Serialize the book into `sink`.
    fn save(&self, sink: &mut dyn Write) -> SheetExportResult<()>;
}

/// Create the default backend for `format_kind`.
pub fn derive_backend(format_kind: EnumFormatKind) -> Box<dyn DocumentBackend> {
    match format_kind {
        EnumFormatKind::Legacy => Box::new(XlsBackend::new()),
        EnumFormatKind::Modern => Box::new(XlsxBackend::new()),
    }
}
