//! Durable store error types.

use thiserror::Error;

/// Errors that can occur during durable store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite database error.
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Table name contains characters other than ASCII alphanumerics and '_'.
    #[error("Invalid table name: {0}")]
    InvalidName(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
