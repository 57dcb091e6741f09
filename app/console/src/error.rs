//! FILENAME: app/console/src/error.rs

use spreadsheet_engine::SpreadsheetError;
use thiserror::Error;
use tko_query::QueryError;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The server answered with a JSON-RPC error object.
    #[error("{name}: {message}")]
    Rpc { name: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),

    /// User input rejected before anything was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
