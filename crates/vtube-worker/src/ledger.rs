//! Tracking of files an upload has placed in the object store.
//!
//! Every output name is recorded before the file is written, so a failure
//! at any point leaves a complete list to delete. The ledger is disarmed
//! only once the video record has been saved; from then on the files
//! belong to the record.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use vtube_storage::{Bucket, ObjectStore};

pub struct ArtifactLedger {
    store: Arc<dyn ObjectStore>,
    entries: Vec<(Bucket, String)>,
    armed: bool,
}

impl ArtifactLedger {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
            armed: true,
        }
    }

    /// Claim `name` before it is written.
    pub fn record(&mut self, bucket: Bucket, name: impl Into<String>) {
        self.entries.push((bucket, name.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand ownership of every recorded file to the committed record.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.entries.clear();
    }

    /// Delete every recorded file. Returns how many existed.
    pub async fn rollback(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        delete_all(self.store.as_ref(), &entries).await
    }
}

async fn delete_all(store: &dyn ObjectStore, entries: &[(Bucket, String)]) -> usize {
    let mut removed = 0;
    // Reverse order: thumbnail first, then variants from lowest quality up
    for (bucket, name) in entries.iter().rev() {
        match store.delete_file(*bucket, name).await {
            Ok(true) => {
                removed += 1;
                debug!(bucket = %bucket, name = %name, "Rolled back artifact");
            }
            Ok(false) => {}
            Err(e) => warn!(bucket = %bucket, name = %name, "Failed to roll back artifact: {}", e),
        }
    }
    removed
}

impl Drop for ArtifactLedger {
    fn drop(&mut self) {
        if !self.armed || self.entries.is_empty() {
            return;
        }

        // Dropped without commit or rollback, e.g. the pipeline future was abandoned
        let entries = std::mem::take(&mut self.entries);
        match Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    delete_all(store.as_ref(), &entries).await;
                });
            }
            Err(_) => warn!(
                "Dropped {} uncommitted artifacts outside a runtime; leaving them for the orphan sweep",
                entries.len()
            ),
        }
    }
}
