//! Cancellation signal for a single upload.

use std::future::{pending, Future};
use tokio::sync::watch;

use crate::error::{IngestError, IngestResult, IngestStage};

/// Receiving side of an upload's cancel flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Create a sender/signal pair.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. A dropped sender never cancels.
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return pending().await;
            }
        }
    }

    /// Fail with [`IngestError::Cancelled`] if cancellation was requested.
    pub fn check(&self, stage: IngestStage) -> IngestResult<()> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled(stage))
        } else {
            Ok(())
        }
    }

    /// Run `fut` unless cancellation arrives first. The losing future is dropped,
    /// which kills any tool process it owns.
    pub async fn guard<T>(&mut self, stage: IngestStage, fut: impl Future<Output = T>) -> IngestResult<T> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(IngestError::Cancelled(stage)),
            out = fut => Ok(out),
        }
    }
}
