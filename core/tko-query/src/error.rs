//! FILENAME: core/tko-query/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Duplicate field name '{name}' or SQL name '{sql_name}'")]
    DuplicateField { name: String, sql_name: String },

    #[error("Field '{name}' resolves to a different field than SQL name '{sql_name}'")]
    InconsistentField { name: String, sql_name: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Malformed SQL name for generated field: {0}")]
    MalformedSqlName(String),

    #[error("Field '{0}' has no single-value SQL condition")]
    UnsupportedCondition(String),

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("You must provide a value")]
    EmptyValue,

    #[error("This field already exists: {0}")]
    FieldExists(String),

    #[error("Filter {0} is empty")]
    EmptyFilter(usize),

    #[error("Global filter cannot be empty")]
    EmptyCondition,

    #[error("Invalid history arguments: {0}")]
    InvalidHistory(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
