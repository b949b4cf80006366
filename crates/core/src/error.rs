#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to serialize report: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to parse spreadsheet: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to export spreadsheet: {0}")]
    Export(#[from] ExportError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Fatal problems with an uploaded workbook. Any of these stops a batch before a
/// single row is submitted.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported file type: {0} (expected .xls or .xlsx)")]
    UnsupportedFileType(String),
    #[error("workbook could not be read: {0}")]
    Malformed(#[from] calamine::Error),
    #[error("workbook has no worksheets")]
    NoWorksheets,
    #[error("no rows found in the uploaded file")]
    NoRows,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("xlsx writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("too many rows for a single worksheet: {0}")]
    TooManyRows(usize),
}
