//! Shared database types for Parley
//!
//! Storage errors shared by the Postgres and in-memory stores.

use thiserror::Error;

/// Database-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    AlreadyExists,

    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Classify an error from a write that may hit a unique constraint.
    ///
    /// Unique violations become `AlreadyExists` so callers can treat them as a
    /// lost race instead of a failure.
    pub fn from_write(err: sqlx::Error) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if is_unique_violation {
            RepositoryError::AlreadyExists
        } else {
            RepositoryError::Connection(err)
        }
    }
}
