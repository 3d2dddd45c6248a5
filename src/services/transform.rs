use crate::services::spreadsheet::{SpreadsheetError, reader, writer};
use thiserror::Error;

/// Name of the only worksheet in every truncated workbook.
pub const OUTPUT_SHEET_NAME: &str = "Sheet1";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unsupported spreadsheet: {0}")]
    Spreadsheet(#[from] SpreadsheetError),
}

/// Pure payload transformation. Failures are returned to the caller, which
/// decides how to contain them.
pub trait Transform: Send + Sync {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Keeps the header and the first `row_limit` data rows of the first
/// worksheet and re-encodes them as a fresh single-sheet workbook.
pub struct SpreadsheetTruncator {
    row_limit: usize,
}

impl SpreadsheetTruncator {
    pub fn new(row_limit: usize) -> Self {
        Self { row_limit }
    }
}

impl Transform for SpreadsheetTruncator {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let sheet = reader::read_first_sheet(input)?;
        tracing::debug!(
            "Truncating sheet with {} data rows to {}",
            sheet.data_rows().len(),
            self.row_limit
        );
        let truncated = sheet.truncated(self.row_limit);
        Ok(writer::write_workbook(&truncated, OUTPUT_SHEET_NAME)?)
    }
}
