//! Story store error types
//!
//! Defines all errors that can occur in the persistence layer.

use thiserror::Error;

/// Errors that can occur in a story store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database query or connection failed
    #[error("Database error: {0}")]
    Database(String),

    /// Requested story does not exist (or has been deleted)
    #[error("Story not found: {0}")]
    StoryNotFound(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input failed validation
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// The store task could not run to completion
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::StoryNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Story not found: abc");

        let err = StoreError::Forbidden("only the owner may delete".to_string());
        assert_eq!(err.to_string(), "Forbidden: only the owner may delete");
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
