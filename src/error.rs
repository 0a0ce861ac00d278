//! Error types for the reporting engine.
//!
//! Only structural failures are errors. Values that fail numeric or date
//! coercion never surface here; they degrade to `ColumnValue::Missing`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Source not found: {0}")]
    MissingSource(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// True for failures that mean "there is nothing to report on",
    /// as opposed to a problem with one particular view.
    pub fn is_missing_source(&self) -> bool {
        matches!(self, EngineError::MissingSource(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
