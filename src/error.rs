//! Error types for the FoxPro extraction pipeline.

use thiserror::Error;

/// Main error type for extraction operations.
///
/// Every variant is unrecoverable for the unit of work in progress: the
/// whole session for connection and schema errors, the single table for
/// per-row errors. Nothing is retried.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Cannot open or maintain the database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// Table or column listing through the driver failed.
    #[error("schema introspection failed: {0}")]
    SchemaIntrospection(String),

    /// A column reported a type code with no known mapping.
    #[error("unsupported FoxPro data type code: {0}")]
    UnsupportedType(i32),

    /// A data cell was null where a value was expected.
    #[error("null value in column '{column}' of table '{table}'")]
    NullValue { table: String, column: String },

    /// IO error (file and directory operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
