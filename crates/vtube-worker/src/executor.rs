//! Upload executor.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vtube_models::{UploadRequest, VideoId, VideoRecord};

use crate::cancel::CancelSignal;
use crate::error::{IngestError, IngestResult, IngestStage};
use crate::metrics;
use crate::pipeline::IngestPipeline;
use crate::state::IngestState;

/// Runs uploads on the tokio runtime, at most `max_concurrent_uploads` at once.
pub struct IngestExecutor {
    pipeline: Arc<IngestPipeline>,
    upload_semaphore: Arc<Semaphore>,
    max_uploads: usize,
}

impl IngestExecutor {
    pub fn new(pipeline: IngestPipeline) -> Self {
        let max_uploads = pipeline.config().max_concurrent_uploads.max(1);
        info!("Starting ingest executor with {} max concurrent uploads", max_uploads);

        Self {
            pipeline: Arc::new(pipeline),
            upload_semaphore: Arc::new(Semaphore::new(max_uploads)),
            max_uploads,
        }
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Queue an upload. It starts once a slot is free.
    pub fn submit<R>(&self, request: UploadRequest, source: R) -> IngestHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let video_id = VideoId::new();
        let (state_tx, state_rx) = watch::channel(IngestState::Received);
        let (cancel_tx, mut cancel) = CancelSignal::channel();

        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.upload_semaphore);
        let token = video_id.clone();

        let task = tokio::spawn(async move {
            let permit = match cancel
                .guard(IngestStage::Intake, semaphore.acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    return Err(fail_queued(
                        &state_tx,
                        IngestError::Aborted {
                            stage: IngestStage::Intake,
                            reason: "executor closed".to_string(),
                        },
                    ))
                }
                Err(e) => return Err(fail_queued(&state_tx, e)),
            };
            let _permit = permit;

            debug!(video_id = %token, "Upload slot acquired");
            pipeline
                .ingest_with(token, request, source, &state_tx, cancel)
                .await
        });

        IngestHandle {
            video_id,
            state: state_rx,
            cancel: Canceller(Arc::new(cancel_tx)),
            task,
        }
    }

    /// Number of uploads currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_uploads - self.upload_semaphore.available_permits()
    }

    /// Wait until no upload holds a slot.
    pub async fn wait_idle(&self) {
        if let Ok(permits) = self.upload_semaphore.acquire_many(self.max_uploads as u32).await {
            drop(permits);
        }
    }
}

/// An upload that ended before it got a slot.
fn fail_queued(state: &watch::Sender<IngestState>, err: IngestError) -> IngestError {
    state.send_replace(IngestState::Failed {
        stage: err.stage(),
        reason: err.to_string(),
    });
    metrics::record_upload(err.outcome(), 0.0);
    err
}

/// Requests cancellation of one upload. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<watch::Sender<bool>>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Handle to a submitted upload.
pub struct IngestHandle {
    video_id: VideoId,
    state: watch::Receiver<IngestState>,
    cancel: Canceller,
    task: JoinHandle<IngestResult<VideoRecord>>,
}

impl IngestHandle {
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Latest published state.
    pub fn state(&self) -> IngestState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<IngestState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        self.cancel.clone()
    }

    /// Wait for the upload to commit or fail.
    pub async fn result(self) -> IngestResult<VideoRecord> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(IngestError::Aborted {
                stage: self.state.borrow().stage(),
                reason: e.to_string(),
            }),
        }
    }
}
