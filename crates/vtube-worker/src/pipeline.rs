//! Upload ingest pipeline.
//!
//! One run walks `Received → Probed → Encoding(i of N) → Thumbnailed →
//! Committed`. Any error, cancellation or tool timeout ends in `Failed`:
//! every artifact recorded in the ledger is deleted, the staging
//! directory (holding the raw upload) is removed and no record is saved.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::watch;
use tracing::Instrument;

use vtube_media::{planner, MediaTools};
use vtube_models::{
    ArtifactNames, CallerThumbnail, SourceGeometry, UploadRequest, VariantSet, VideoId,
    VideoRecord,
};
use vtube_records::VideoRepository;
use vtube_storage::{Bucket, ObjectStore};

use crate::cancel::CancelSignal;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult, IngestStage};
use crate::ledger::ArtifactLedger;
use crate::logging::UploadLogger;
use crate::metrics;
use crate::state::IngestState;

/// Everything one run needs besides the pipeline's collaborators.
struct Run<'a> {
    names: ArtifactNames,
    source_path: PathBuf,
    staging_dir: PathBuf,
    state: &'a watch::Sender<IngestState>,
    cancel: CancelSignal,
    ledger: &'a mut ArtifactLedger,
    logger: &'a UploadLogger,
}

/// Orchestrates probe, planning, encoding, thumbnailing and commit.
#[derive(Clone)]
pub struct IngestPipeline {
    config: Arc<IngestConfig>,
    tools: Arc<dyn MediaTools>,
    store: Arc<dyn ObjectStore>,
    videos: Arc<dyn VideoRepository>,
}

impl IngestPipeline {
    pub fn new(
        config: IngestConfig,
        tools: Arc<dyn MediaTools>,
        store: Arc<dyn ObjectStore>,
        videos: Arc<dyn VideoRepository>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tools,
            store,
            videos,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one upload under a fresh token, without cancellation.
    pub async fn ingest<R>(&self, request: UploadRequest, source: R) -> IngestResult<VideoRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (state, _) = watch::channel(IngestState::Received);
        self.ingest_with(VideoId::new(), request, source, &state, CancelSignal::never())
            .await
    }

    /// Ingest one upload, publishing progress on `state`.
    ///
    /// `token` becomes the video ID and prefixes every generated filename.
    pub async fn ingest_with<R>(
        &self,
        token: VideoId,
        request: UploadRequest,
        mut source: R,
        state: &watch::Sender<IngestState>,
        cancel: CancelSignal,
    ) -> IngestResult<VideoRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let logger = UploadLogger::new(&token, &request.title);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            metrics::uploads_in_flight(1.0);
            state.send_replace(IngestState::Received);

            let mut ledger = ArtifactLedger::new(Arc::clone(&self.store));
            let result = self
                .execute(&token, request, &mut source, state, cancel, &mut ledger, &logger)
                .await;
            let elapsed = started.elapsed().as_secs_f64();

            match &result {
                Ok(record) => {
                    logger.log_completion(&format!(
                        "{} variants [{}], thumbnail {}, duration {}",
                        record.variants.len(),
                        record.variants.qualities().join(", "),
                        record.thumbnail_filename,
                        record.duration
                    ));
                    state.send_replace(IngestState::Committed {
                        video_id: record.video_id.clone(),
                    });
                    metrics::record_upload("committed", elapsed);
                }
                Err(e) => {
                    let removed = ledger.rollback().await;
                    logger.log_error(
                        e.stage().as_str(),
                        &format!("{} ({} artifacts removed)", e, removed),
                    );
                    state.send_replace(IngestState::Failed {
                        stage: e.stage(),
                        reason: e.to_string(),
                    });
                    metrics::record_upload(e.outcome(), elapsed);
                }
            }

            metrics::uploads_in_flight(-1.0);
            result
        }
        .instrument(span)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute<R>(
        &self,
        token: &VideoId,
        request: UploadRequest,
        source: &mut R,
        state: &watch::Sender<IngestState>,
        cancel: CancelSignal,
        ledger: &mut ArtifactLedger,
        logger: &UploadLogger,
    ) -> IngestResult<VideoRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let extension = request.validate(&self.config.allowed_extensions)?;
        let names = ArtifactNames::new(token.clone(), request.base_name());
        logger.log_start(&format!(
            "{:?} from {}",
            request.title, request.source_filename
        ));

        // Dropping the TempDir removes the raw upload on every exit path
        let staging = self
            .create_staging(token)
            .await
            .map_err(IngestError::Intake)?;
        let mut run = Run {
            source_path: staging.path().join(names.source(&extension)),
            staging_dir: staging.path().to_path_buf(),
            names,
            state,
            cancel,
            ledger,
            logger,
        };

        let bytes = run
            .cancel
            .guard(IngestStage::Intake, stage_upload(source, &run.source_path))
            .await?
            .map_err(IngestError::Intake)?;
        logger.log_progress("intake", &format!("received {} bytes", bytes));

        let probe = run
            .cancel
            .guard(IngestStage::Probe, self.tools.probe(&run.source_path))
            .await?
            .map_err(IngestError::Probe)?;
        let duration = probe.duration_string();
        run.state.send_replace(IngestState::Probed {
            geometry: probe.geometry,
            duration: duration.clone(),
        });
        logger.log_progress(
            "probe",
            &format!("{} source, duration {}", probe.geometry, duration),
        );

        let variants = self.encode_ladder(&mut run, probe.geometry).await?;

        let thumbnail_filename = self
            .produce_thumbnail(&mut run, request.thumbnail.as_ref())
            .await?;
        run.state.send_replace(IngestState::Thumbnailed);

        // Last point at which cancellation is honoured
        run.cancel.check(IngestStage::Persist)?;

        let record = VideoRecord {
            video_id: token.clone(),
            title: request.title.trim().to_string(),
            description: request.description,
            variants,
            thumbnail_filename,
            duration,
            uploader_id: request.uploader_id,
            views: 0,
            likes: 0,
            created_at: chrono::Utc::now(),
        };
        self.videos
            .save(record.clone())
            .await
            .map_err(IngestError::Persist)?;
        run.ledger.disarm();

        if let Err(e) = staging.close() {
            logger.log_warning("persist", &format!("failed to remove staging directory: {}", e));
        }

        Ok(record)
    }

    /// Encode every non-skipped rung in ladder order.
    async fn encode_ladder(
        &self,
        run: &mut Run<'_>,
        geometry: SourceGeometry,
    ) -> IngestResult<VariantSet> {
        let plans = vtube_media::plan_ladder(geometry, &self.config.ladder);
        let total = plans.iter().filter(|p| !p.is_skip()).count();
        let mut variants = VariantSet::new();
        let mut index = 0;

        for plan in plans {
            let quality = plan.target.name;
            if plan.is_skip() {
                metrics::record_variant_skipped(quality);
                run.logger.log_progress(
                    "plan",
                    &format!("skipping {}: source {} would be upscaled", quality, geometry),
                );
                continue;
            }
            planner::verify(&plan).map_err(|source| IngestError::Plan {
                quality: quality.to_string(),
                source,
            })?;

            index += 1;
            run.state.send_replace(IngestState::Encoding {
                index,
                total,
                quality,
            });

            let filename = run.names.variant(quality);
            let staged = run.staging_dir.join(&filename);
            let encoded = run
                .cancel
                .guard(
                    IngestStage::Encode,
                    self.tools.encode(&run.source_path, &plan, &staged),
                )
                .await?;

            let stored = match encoded {
                Ok(()) => {
                    run.ledger.record(Bucket::Variants, &filename);
                    self.store
                        .put_file(Bucket::Variants, &filename, &staged)
                        .await
                        .map_err(|e| IngestError::store(IngestStage::Encode, &filename, e))
                }
                Err(e) => Err(IngestError::encode(quality, e)),
            };

            match stored {
                Ok(()) => {
                    metrics::record_variant_encoded(quality);
                    run.logger.log_progress(
                        "encode",
                        &format!("{} ({}/{}) -> {}", quality, index, total, filename),
                    );
                    variants.insert(quality, filename);
                }
                Err(e) => {
                    metrics::record_variant_failure(quality);
                    if self.config.is_required(quality) {
                        return Err(e);
                    }
                    // Optional rung: drop whatever it left behind and carry on
                    if let Err(cleanup) = tokio::fs::remove_file(&staged).await {
                        if cleanup.kind() != std::io::ErrorKind::NotFound {
                            run.logger.log_warning(
                                "encode",
                                &format!("failed to remove staged {}: {}", filename, cleanup),
                            );
                        }
                    }
                    if let Err(cleanup) = self.store.delete_file(Bucket::Variants, &filename).await {
                        run.logger.log_warning(
                            "encode",
                            &format!("failed to delete stored {}: {}", filename, cleanup),
                        );
                    }
                    run.logger
                        .log_warning("encode", &format!("optional {} omitted: {}", quality, e));
                }
            }
        }

        if variants.is_empty() {
            return Err(IngestError::NoVariants);
        }
        Ok(variants)
    }

    /// Store the caller's thumbnail, or extract one from the source.
    async fn produce_thumbnail(
        &self,
        run: &mut Run<'_>,
        caller: Option<&CallerThumbnail>,
    ) -> IngestResult<String> {
        let stage = IngestStage::Thumbnail;

        if let Some(thumb) = caller {
            let name = run.names.caller_thumbnail(&thumb.filename);
            run.ledger.record(Bucket::Thumbnails, &name);
            run.cancel
                .guard(
                    stage,
                    self.store.write_file(Bucket::Thumbnails, &name, &thumb.bytes),
                )
                .await?
                .map_err(|e| IngestError::store(stage, &name, e))?;
            run.logger
                .log_progress("thumbnail", &format!("using caller thumbnail {}", name));
            return Ok(name);
        }

        let name = run.names.thumbnail();
        let staged = run.staging_dir.join(&name);
        run.cancel
            .guard(
                stage,
                self.tools
                    .extract_thumbnail(&run.source_path, self.config.thumbnail_at_secs, &staged),
            )
            .await?
            .map_err(IngestError::Thumbnail)?;

        run.ledger.record(Bucket::Thumbnails, &name);
        self.store
            .put_file(Bucket::Thumbnails, &name, &staged)
            .await
            .map_err(|e| IngestError::store(stage, &name, e))?;
        run.logger
            .log_progress("thumbnail", &format!("extracted {}", name));
        Ok(name)
    }

    /// Per-upload staging directory under the work dir, prefixed by the token.
    async fn create_staging(&self, token: &VideoId) -> std::io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        tempfile::Builder::new()
            .prefix(&format!("{}_", token))
            .tempdir_in(&self.config.work_dir)
    }
}

/// Copy the upload stream to `path` without buffering it whole.
async fn stage_upload<R>(source: &mut R, path: &Path) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(path).await?;
    let bytes = tokio::io::copy(source, &mut file).await?;
    file.flush().await?;

    if bytes == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "upload stream is empty",
        ));
    }
    Ok(bytes)
}
