use thiserror::Error;

use spotter_shared::{IdentityError, PairError};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The access policy rejected the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The request itself is malformed (e.g. a key that does not match its pair).
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row, column {column}: {reason}")]
    Corrupt { column: usize, reason: String },

    /// The store cannot serve requests right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Pair error: {0}")]
    Pair(#[from] PairError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(column, _, reason) => StoreError::Corrupt {
                column,
                reason: reason.to_string(),
            },
            rusqlite::Error::InvalidColumnType(column, name, ty) => StoreError::Corrupt {
                column,
                reason: format!("`{name}` holds {ty}"),
            },
            other => StoreError::Sqlite(other),
        }
    }
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
