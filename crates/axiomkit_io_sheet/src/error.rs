//! Error type shared by the export engine and its backends.

use thiserror::Error;

/// Failure of an export call.
///
/// `Config` is raised by the engine itself and aborts the current batch;
/// every other variant is propagated unchanged from a backend or record source.
#[derive(Debug, Error)]
pub enum SheetExportError {
    /// Invalid export configuration.
    #[error("invalid export configuration: {0}")]
    Config(String),
    /// Write or end-write after the document was already serialized.
    #[error("cannot write after end_write()")]
    Closed,
    /// Modern workbook backend failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Legacy workbook backend failure.
    #[error("xls write error: {0}")]
    Biff(String),
    /// Record source failure.
    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
    /// Output sink failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SheetExportError {
    /// Build a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error came from configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result alias used across the crate.
pub type SheetExportResult<T> = Result<T, SheetExportError>;
