//! Observable pipeline state.

use serde::Serialize;

use crate::error::IngestStage;
use vtube_models::{SourceGeometry, VideoId};

/// Progress of one upload through the pipeline.
///
/// `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestState {
    Received,
    Probed {
        geometry: SourceGeometry,
        duration: String,
    },
    Encoding {
        /// 1-based position among the variants actually encoded
        index: usize,
        total: usize,
        quality: &'static str,
    },
    Thumbnailed,
    Committed {
        video_id: VideoId,
    },
    Failed {
        stage: IngestStage,
        reason: String,
    },
}

impl IngestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestState::Committed { .. } | IngestState::Failed { .. })
    }

    /// Stage in progress while in this state.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestState::Received => IngestStage::Intake,
            IngestState::Probed { .. } | IngestState::Encoding { .. } => IngestStage::Encode,
            IngestState::Thumbnailed | IngestState::Committed { .. } => IngestStage::Persist,
            IngestState::Failed { stage, .. } => *stage,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IngestState::Received => "received",
            IngestState::Probed { .. } => "probed",
            IngestState::Encoding { .. } => "encoding",
            IngestState::Thumbnailed => "thumbnailed",
            IngestState::Committed { .. } => "committed",
            IngestState::Failed { .. } => "failed",
        }
    }
}
