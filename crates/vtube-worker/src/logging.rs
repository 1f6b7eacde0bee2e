//! Structured upload logging utilities.
//!
//! Provides consistent, structured logging for uploads with a tracing span
//! carrying the upload token.

use tracing::{error, info, warn, Span};
use vtube_models::VideoId;

/// Upload logger with a fixed lifecycle vocabulary.
#[derive(Debug, Clone)]
pub struct UploadLogger {
    video_id: String,
    title: String,
}

impl UploadLogger {
    pub fn new(video_id: &VideoId, title: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(video_id = %self.video_id, "Upload started: {}", message);
    }

    pub fn log_progress(&self, stage: &str, message: &str) {
        info!(video_id = %self.video_id, stage, "Upload progress: {}", message);
    }

    pub fn log_warning(&self, stage: &str, message: &str) {
        warn!(video_id = %self.video_id, stage, "Upload warning: {}", message);
    }

    pub fn log_error(&self, stage: &str, message: &str) {
        error!(video_id = %self.video_id, stage, "Upload failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(video_id = %self.video_id, "Upload committed: {}", message);
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Span wrapping the whole pipeline run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("upload", video_id = %self.video_id, title = %self.title)
    }
}
