//! Ingest error types.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use vtube_media::MediaError;
use vtube_models::UploadRejection;
use vtube_records::RecordError;
use vtube_storage::StorageError;

pub type IngestResult<T> = Result<T, IngestError>;

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Intake,
    Probe,
    Plan,
    Encode,
    Thumbnail,
    Persist,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Intake => "intake",
            IngestStage::Probe => "probe",
            IngestStage::Plan => "plan",
            IngestStage::Encode => "encode",
            IngestStage::Thumbnail => "thumbnail",
            IngestStage::Persist => "persist",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upload did not commit.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload rejected: {0}")]
    Rejected(#[from] UploadRejection),

    #[error("intake failed: {0}")]
    Intake(#[source] std::io::Error),

    #[error("probe failed: {0}")]
    Probe(#[source] MediaError),

    #[error("planning {quality} failed: {source}")]
    Plan {
        quality: String,
        #[source]
        source: MediaError,
    },

    #[error("encoding {quality} failed: {source}")]
    Encode {
        quality: String,
        #[source]
        source: MediaError,
    },

    #[error("no variant could be produced")]
    NoVariants,

    #[error("thumbnail failed: {0}")]
    Thumbnail(#[source] MediaError),

    #[error("storing {name} failed during {stage}: {source}")]
    Store {
        stage: IngestStage,
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("persist failed: {0}")]
    Persist(#[source] RecordError),

    #[error("upload cancelled during {0}")]
    Cancelled(IngestStage),

    #[error("upload aborted during {stage}: {reason}")]
    Aborted { stage: IngestStage, reason: String },
}

impl IngestError {
    pub fn encode(quality: impl Into<String>, source: MediaError) -> Self {
        Self::Encode {
            quality: quality.into(),
            source,
        }
    }

    pub fn store(stage: IngestStage, name: impl Into<String>, source: StorageError) -> Self {
        Self::Store {
            stage,
            name: name.into(),
            source,
        }
    }

    /// Stage the failure originated in.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::Rejected(_) | IngestError::Intake(_) => IngestStage::Intake,
            IngestError::Probe(_) => IngestStage::Probe,
            IngestError::Plan { .. } => IngestStage::Plan,
            IngestError::Encode { .. } | IngestError::NoVariants => IngestStage::Encode,
            IngestError::Thumbnail(_) => IngestStage::Thumbnail,
            IngestError::Persist(_) => IngestStage::Persist,
            IngestError::Store { stage, .. }
            | IngestError::Cancelled(stage)
            | IngestError::Aborted { stage, .. } => *stage,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IngestError::Cancelled(_))
    }

    /// True when an external tool was killed for exceeding its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.media_error(), Some(MediaError::Timeout { .. }))
    }

    /// Underlying tool error, if any.
    pub fn media_error(&self) -> Option<&MediaError> {
        match self {
            IngestError::Probe(e)
            | IngestError::Thumbnail(e)
            | IngestError::Plan { source: e, .. }
            | IngestError::Encode { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            IngestError::Rejected(_) => "rejected",
            IngestError::Cancelled(_) => "cancelled",
            _ if self.is_timeout() => "timeout",
            _ => "failed",
        }
    }
}
