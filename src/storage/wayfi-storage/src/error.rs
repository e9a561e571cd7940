//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry already exists (unique constraint).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Database could not be opened or reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A statement failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Transaction could not be started or committed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Caller supplied an unusable argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
