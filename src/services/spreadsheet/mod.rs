//! Minimal Office Open XML (`.xlsx`) support: read the first worksheet of a
//! workbook into memory and write a single-sheet workbook back out.

pub mod reader;
pub mod writer;

use thiserror::Error;

/// Highest column count a worksheet may address (`XFD`).
pub const MAX_COLUMNS: usize = 16_384;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Not a readable xlsx archive: {0}")]
    Archive(String),

    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("Workbook part missing: {0}")]
    MissingPart(String),

    #[error("Workbook contains no worksheets")]
    NoWorksheet,

    #[error("Invalid cell {reference}: {message}")]
    InvalidCell { reference: String, message: String },

    #[error("Failed to write workbook: {0}")]
    Write(String),
}

impl From<zip::result::ZipError> for SpreadsheetError {
    fn from(e: zip::result::ZipError) -> Self {
        SpreadsheetError::Archive(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    /// Numeric literal exactly as stored in the sheet
    Number(String),
    /// Date or time as its stored serial day number (days since 1899-12-30)
    Date(String),
    Bool(bool),
    /// Error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

/// Dense row; `None` marks an empty cell.
pub type Row = Vec<Option<CellValue>>;

/// The non-blank rows of one worksheet. The first row is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Header plus at most `limit` data rows.
    pub fn truncated(&self, limit: usize) -> Sheet {
        Sheet {
            rows: self.rows.iter().take(limit.saturating_add(1)).cloned().collect(),
        }
    }
}

pub(crate) fn is_blank_row(row: &Row) -> bool {
    row.iter().all(|cell| cell.as_ref().is_none_or(CellValue::is_blank))
}

/// Zero-based column index to its letters: 0 -> `A`, 27 -> `AB`.
pub fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Zero-based column index of an `A1`-style reference.
pub fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let index = letters.iter().fold(0usize, |acc, b| {
        acc * 26 + (b.to_ascii_uppercase() - b'A') as usize + 1
    }) - 1;
    let rest = &reference[letters.len()..];
    if !rest.is_empty() && !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    (index < MAX_COLUMNS).then_some(index)
}
