//! Record store error types.

use thiserror::Error;

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors that can occur while reading or mutating records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Video already exists: {0}")]
    AlreadyExists(String),

    #[error("User {0} cannot subscribe to themselves")]
    SelfSubscription(String),

    #[error("Persist failed: {0}")]
    PersistFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecordError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn persist_failed(msg: impl Into<String>) -> Self {
        Self::PersistFailed(msg.into())
    }
}
