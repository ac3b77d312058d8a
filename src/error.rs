use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads, filters, or writes workbooks.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Raised when an input is neither a recognised workbook nor an archive.
    #[error("unsupported input '{input}': {reason}")]
    UnsupportedFormat { input: String, reason: String },

    /// Raised when not a single sheet could be loaded from the sources.
    #[error("no valid Excel sheets found in the source inputs")]
    NoData,

    /// Raised when the identifier column cannot be resolved.
    #[error("'{column}' column not found in {context}. Available columns: {available:?}")]
    MissingColumn {
        column: String,
        context: ColumnContext,
        available: Vec<String>,
    },

    /// Raised when the reference column yields no usable values.
    #[error("no SKUs found in reference column '{column}'")]
    EmptyReference { column: String },

    /// Raised when a directly supplied workbook cannot be parsed.
    #[error("failed to read workbook '{input}': {reason}")]
    UnreadableWorkbook { input: String, reason: String },

    /// Raised when a zip container cannot be opened.
    #[error("failed to open archive '{input}': {reason}")]
    InvalidArchive { input: String, reason: String },

    /// Raised when the requested rows-per-sheet limit is unusable.
    #[error("invalid rows-per-sheet limit {0}: must be at least 1")]
    InvalidSheetLimit(usize),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Which table was searched when a column could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnContext {
    /// The unified table built from the source inputs.
    Data,
    /// The reference workbook.
    Reference,
}

impl std::fmt::Display for ColumnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnContext::Data => write!(f, "data file"),
            ColumnContext::Reference => write!(f, "SKU file"),
        }
    }
}

impl ToolError {
    /// Stable machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnsupportedFormat { .. } => "unsupported_format",
            ToolError::NoData => "no_data",
            ToolError::MissingColumn { .. } => "missing_column",
            ToolError::EmptyReference { .. } => "empty_reference",
            ToolError::UnreadableWorkbook { .. } => "unreadable_workbook",
            ToolError::InvalidArchive { .. } => "invalid_archive",
            ToolError::InvalidSheetLimit(_) => "invalid_sheet_limit",
            ToolError::MissingInput(_) => "missing_input",
            ToolError::Io(_) => "io",
            ToolError::Json(_) => "json",
            ToolError::ExcelWrite(_) => "excel_write",
            ToolError::Logging(_) => "logging",
        }
    }

    /// Whether the failure was caused by the supplied inputs rather than by
    /// the tool itself. Upload front ends map these to a 4xx status.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ToolError::Io(_) | ToolError::Json(_) | ToolError::ExcelWrite(_) | ToolError::Logging(_)
        )
    }
}
