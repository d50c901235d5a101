//! Error types for circle operations.
//!
//! This module defines errors that can occur while managing circles,
//! membership and ballots, including precondition failures and
//! storage errors.

use thiserror::Error;

/// Error type for circle operations.
#[derive(Error, Debug)]
pub enum CircleError {
    /// Malformed input, e.g. a proposed amount below one.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacks the role required for the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Circle, user or ballot row is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate membership.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CircleError {
    /// Returns whether this error came from the store rather than a
    /// violated precondition.
    ///
    /// Covers `Storage`, `Database` and `InvalidData` (a stored row that
    /// cannot be decoded). Store failures abort the surrounding
    /// transaction and leave no partial state.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Database(_) | Self::InvalidData(_)
        )
    }
}

/// Result type alias for circle operations.
pub type Result<T> = std::result::Result<T, CircleError>;
