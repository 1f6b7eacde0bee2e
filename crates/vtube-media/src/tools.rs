//! The media tool seam used by the ingest pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::command::{check_tools, ToolRunner};
use crate::encode::encode_variant;
use crate::error::MediaResult;
use crate::probe::{probe_source, ProbeResult};
use crate::thumbnail::extract_thumbnail;
use vtube_models::encoding::THUMBNAIL_SCALE_WIDTH;
use vtube_models::{EncodePlan, EncodingConfig};

/// Probe, encode and thumbnail operations on local files.
///
/// Dropping any returned future aborts the underlying tool process.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Read source geometry and duration.
    async fn probe(&self, source: &Path) -> MediaResult<ProbeResult>;

    /// Encode one non-skip plan into `output`.
    async fn encode(&self, source: &Path, plan: &EncodePlan, output: &Path) -> MediaResult<()>;

    /// Write a single frame taken at `at_secs` into `output`.
    async fn extract_thumbnail(&self, source: &Path, at_secs: f64, output: &Path)
        -> MediaResult<()>;
}

/// [`MediaTools`] backed by the FFmpeg and FFprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    encoding: EncodingConfig,
    thumbnail_width: u32,
    runner: ToolRunner,
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            encoding: EncodingConfig::default(),
            thumbnail_width: THUMBNAIL_SCALE_WIDTH,
            runner: ToolRunner::new(),
        }
    }

    /// Kill any single tool invocation running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    /// Share a bound on concurrently running tool processes.
    pub fn with_process_limit(mut self, permits: Arc<Semaphore>) -> Self {
        self.runner = self.runner.with_permits(permits);
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe(&self) -> &Path {
        &self.ffprobe
    }

    /// Verify both executables are reachable.
    pub fn check(&self) -> MediaResult<()> {
        check_tools(&self.ffmpeg, &self.ffprobe)
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe(&self, source: &Path) -> MediaResult<ProbeResult> {
        probe_source(&self.ffprobe, &self.runner, source).await
    }

    async fn encode(&self, source: &Path, plan: &EncodePlan, output: &Path) -> MediaResult<()> {
        encode_variant(
            &self.ffmpeg,
            &self.runner,
            source,
            plan,
            output,
            &self.encoding,
        )
        .await
    }

    async fn extract_thumbnail(
        &self,
        source: &Path,
        at_secs: f64,
        output: &Path,
    ) -> MediaResult<()> {
        extract_thumbnail(
            &self.ffmpeg,
            &self.runner,
            source,
            at_secs,
            self.thumbnail_width,
            output,
        )
        .await
    }
}
