//! Persistence errors shared by every store adapter.

use thiserror::Error;

/// Errors raised by the persistence port.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row does not exist or is not owned by the caller.
    #[error("Not found")]
    NotFound,

    /// A uniqueness rule was violated on a client-supplied field.
    #[error("Conflict on {field}: {message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for persistence operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            field,
            message: message.into(),
        }
    }
}

/// Returns true when a sqlx error is a unique-constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
