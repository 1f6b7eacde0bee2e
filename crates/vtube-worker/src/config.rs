//! Ingest configuration.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use vtube_models::encoding::THUMBNAIL_AT_SECS;
use vtube_models::upload::default_allowed_extensions;
use vtube_models::{EncodingConfig, QualityTarget, QUALITY_LADDER, REQUIRED_QUALITIES};

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("required quality {0} is not on the ladder")]
    RequiredNotOnLadder(String),

    #[error("quality ladder is empty")]
    EmptyLadder,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration passed to pipeline construction. Built once at startup.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// FFmpeg executable (bare name resolves on `PATH`)
    pub ffmpeg_path: PathBuf,
    /// FFprobe executable (bare name resolves on `PATH`)
    pub ffprobe_path: PathBuf,
    /// Parent of per-upload staging directories
    pub work_dir: PathBuf,
    /// Output directory for encoded variants
    pub variants_dir: PathBuf,
    /// Output directory for thumbnails
    pub thumbnails_dir: PathBuf,
    /// JSON file holding video records
    pub records_path: PathBuf,
    /// Kill any single tool invocation running longer than this
    pub tool_timeout: Duration,
    /// Maximum uploads processed at once
    pub max_concurrent_uploads: usize,
    /// Maximum FFmpeg/FFprobe processes across all uploads
    pub max_tool_processes: usize,
    /// Timestamp of the extracted thumbnail frame
    pub thumbnail_at_secs: f64,
    /// Uploader recorded for files ingested from the command line
    pub uploader_id: String,
    /// Orphaned files younger than this are left alone by the sweep
    pub sweep_min_age: Duration,
    /// Accepted source extensions, lowercase
    pub allowed_extensions: Vec<String>,
    /// Targets attempted for every upload, in order
    pub ladder: Vec<QualityTarget>,
    /// Ladder names that must encode for an upload to commit
    pub required_qualities: Vec<String>,
    /// Codec policy for every variant
    pub encoding: EncodingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            work_dir: PathBuf::from("/tmp/vtube"),
            variants_dir: PathBuf::from("data/videos"),
            thumbnails_dir: PathBuf::from("data/thumbnails"),
            records_path: PathBuf::from("data/records.json"),
            tool_timeout: Duration::from_secs(1800), // 30 minutes
            max_concurrent_uploads: 2,
            max_tool_processes: 4,
            thumbnail_at_secs: THUMBNAIL_AT_SECS,
            uploader_id: "local".to_string(),
            sweep_min_age: Duration::from_secs(3600),
            allowed_extensions: default_allowed_extensions(),
            ladder: QUALITY_LADDER.to_vec(),
            required_qualities: REQUIRED_QUALITIES.iter().map(|q| q.to_string()).collect(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: env_path("VTUBE_FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env_path("VTUBE_FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            work_dir: env_path("VTUBE_WORK_DIR").unwrap_or(defaults.work_dir),
            variants_dir: env_path("VTUBE_VARIANTS_DIR").unwrap_or(defaults.variants_dir),
            thumbnails_dir: env_path("VTUBE_THUMBNAILS_DIR").unwrap_or(defaults.thumbnails_dir),
            records_path: env_path("VTUBE_RECORDS_PATH").unwrap_or(defaults.records_path),
            tool_timeout: Duration::from_secs(
                std::env::var("VTUBE_TOOL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.tool_timeout.as_secs()),
            ),
            max_concurrent_uploads: std::env::var("VTUBE_MAX_UPLOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_uploads),
            max_tool_processes: std::env::var("VTUBE_MAX_TOOL_PROCESSES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tool_processes),
            thumbnail_at_secs: std::env::var("VTUBE_THUMBNAIL_AT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &f64| secs.is_finite() && *secs >= 0.0)
                .unwrap_or(defaults.thumbnail_at_secs),
            uploader_id: std::env::var("VTUBE_UPLOADER_ID").unwrap_or(defaults.uploader_id),
            sweep_min_age: Duration::from_secs(
                std::env::var("VTUBE_SWEEP_MIN_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.sweep_min_age.as_secs()),
            ),
            ..defaults
        }
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ladder.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        if let Some(missing) = self
            .required_qualities
            .iter()
            .find(|name| !self.ladder.iter().any(|q| q.name == name.as_str()))
        {
            return Err(ConfigError::RequiredNotOnLadder(missing.clone()));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::Zero("max_concurrent_uploads"));
        }
        if self.max_tool_processes == 0 {
            return Err(ConfigError::Zero("max_tool_processes"));
        }
        if self.tool_timeout.is_zero() {
            return Err(ConfigError::Zero("tool_timeout"));
        }
        Ok(())
    }

    pub fn is_required(&self, quality: &str) -> bool {
        self.required_qualities.iter().any(|q| q == quality)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
