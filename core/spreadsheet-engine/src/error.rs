//! FILENAME: core/spreadsheet-engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetError {
    #[error("Resulting spreadsheet contains {cell_count} cells, exceeding maximum {max}")]
    TooManyCells { cell_count: usize, max: usize },

    #[error("Malformed group data: {0}")]
    MalformedGroup(String),

    #[error("Spreadsheet is rendering")]
    RenderInProgress,

    #[error("Unknown header: {0:?}")]
    UnknownHeader(Vec<String>),
}

pub type SpreadsheetResult<T> = Result<T, SpreadsheetError>;
