//! Record store backed by memory, optionally persisted to a JSON file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RecordError, RecordResult};
use crate::metrics::{record_operation, record_saved};
use crate::repository::{LikeOutcome, SubscriptionRepository, VideoRepository};
use crate::state::StoreState;
use vtube_models::{UserId, VideoId, VideoRecord};

/// Video and subscription store.
///
/// With a backing file every mutation is applied to a copy of the state,
/// written to a sibling temp file and renamed over the original. The
/// in-memory state only changes once the rename succeeds, so a failed
/// write leaves both views untouched.
#[derive(Debug, Default)]
pub struct RecordStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store from `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> RecordResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };

        info!("Opened record store at {}", path.display());
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    async fn read<T>(&self, operation: &'static str, f: impl FnOnce(&StoreState) -> T) -> T {
        let started = Instant::now();
        let out = f(&*self.state.read().await);
        record_operation(operation, true, started.elapsed().as_secs_f64());
        out
    }

    async fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut StoreState) -> RecordResult<T>,
    ) -> RecordResult<T> {
        let started = Instant::now();
        let mut guard = self.state.write().await;

        let result = match &self.path {
            None => f(&mut *guard),
            Some(path) => {
                let mut next = guard.clone();
                match f(&mut next) {
                    Ok(value) => match persist(path, &next).await {
                        Ok(()) => {
                            *guard = next;
                            Ok(value)
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = &result {
            debug!(operation, error = %e, "Record operation failed");
        }
        record_operation(operation, result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}

/// Write `state` to `path` via a temp file and rename.
async fn persist(path: &Path, state: &StoreState) -> RecordResult<()> {
    let bytes = serde_json::to_vec_pretty(state)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(RecordError::persist_failed(format!("{}: {}", tmp.display(), e)));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        warn!("Failed to replace {}: {}", path.display(), e);
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(RecordError::persist_failed(format!("{}: {}", path.display(), e)));
    }
    Ok(())
}

#[async_trait]
impl VideoRepository for RecordStore {
    async fn save(&self, record: VideoRecord) -> RecordResult<VideoId> {
        let title = record.title.clone();
        let id = self.mutate("save", |state| state.insert(record)).await?;
        record_saved();
        info!(video_id = %id, title = %title, "Saved video record");
        Ok(id)
    }

    async fn get(&self, video_id: &VideoId) -> RecordResult<Option<VideoRecord>> {
        Ok(self.read("get", |state| state.get(video_id).cloned()).await)
    }

    async fn increment_views(&self, video_id: &VideoId) -> RecordResult<u64> {
        self.mutate("increment_views", |state| state.increment_views(video_id))
            .await
    }

    async fn toggle_like(&self, video_id: &VideoId, user: &UserId) -> RecordResult<LikeOutcome> {
        self.mutate("toggle_like", |state| state.toggle_like(video_id, user))
            .await
    }

    async fn has_liked(&self, video_id: &VideoId, user: &UserId) -> RecordResult<bool> {
        Ok(self
            .read("has_liked", |state| state.has_liked(video_id, user))
            .await)
    }

    async fn list_by_uploader(&self, user: &UserId) -> RecordResult<Vec<VideoRecord>> {
        Ok(self
            .read("list_by_uploader", |state| state.list_by_uploader(user))
            .await)
    }

    async fn list_liked(&self, user: &UserId) -> RecordResult<Vec<VideoRecord>> {
        Ok(self.read("list_liked", |state| state.list_liked(user)).await)
    }

    async fn list_all(&self) -> RecordResult<Vec<VideoRecord>> {
        Ok(self.read("list_all", StoreState::list_all).await)
    }
}

#[async_trait]
impl SubscriptionRepository for RecordStore {
    async fn subscribe(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool> {
        self.mutate("subscribe", |state| state.subscribe(subscriber, channel))
            .await
    }

    async fn unsubscribe(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool> {
        self.mutate("unsubscribe", |state| Ok(state.unsubscribe(subscriber, channel)))
            .await
    }

    async fn is_subscribed(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool> {
        Ok(self
            .read("is_subscribed", |state| state.is_subscribed(subscriber, channel))
            .await)
    }

    async fn list_subscriptions(&self, subscriber: &UserId) -> RecordResult<Vec<UserId>> {
        Ok(self
            .read("list_subscriptions", |state| state.list_subscriptions(subscriber))
            .await)
    }

    async fn list_subscribers(&self, channel: &UserId) -> RecordResult<Vec<UserId>> {
        Ok(self
            .read("list_subscribers", |state| state.list_subscribers(channel))
            .await)
    }

    async fn subscriber_count(&self, channel: &UserId) -> RecordResult<u64> {
        Ok(self
            .read("subscriber_count", |state| state.list_subscribers(channel).len() as u64)
            .await)
    }
}
