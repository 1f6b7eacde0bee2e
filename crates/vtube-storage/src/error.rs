//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidKey(String),

    #[error("Write failed for {name}: {source}")]
    WriteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Delete failed for {name}: {source}")]
    DeleteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn invalid_key(name: impl Into<String>) -> Self {
        Self::InvalidKey(name.into())
    }

    pub fn write_failed(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            name: name.into(),
            source,
        }
    }
}
