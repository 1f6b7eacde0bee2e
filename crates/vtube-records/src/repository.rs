//! Repository interfaces.
//!
//! Relationships are explicit queries returning plain records rather than
//! traversable object graphs.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::RecordResult;
use vtube_models::{UserId, VideoId, VideoRecord};

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    /// Whether the user likes the video after the toggle
    pub liked: bool,
    /// Like count after the toggle
    pub likes: u64,
}

/// Persistence of committed video records and their counters.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Persist a complete record. Fails if the ID is already taken.
    async fn save(&self, record: VideoRecord) -> RecordResult<VideoId>;

    async fn get(&self, video_id: &VideoId) -> RecordResult<Option<VideoRecord>>;

    /// Add one view and return the new count.
    async fn increment_views(&self, video_id: &VideoId) -> RecordResult<u64>;

    /// Like the video if `user` has not, otherwise remove the like.
    async fn toggle_like(&self, video_id: &VideoId, user: &UserId) -> RecordResult<LikeOutcome>;

    async fn has_liked(&self, video_id: &VideoId, user: &UserId) -> RecordResult<bool>;

    /// Videos uploaded by `user`, newest first.
    async fn list_by_uploader(&self, user: &UserId) -> RecordResult<Vec<VideoRecord>>;

    /// Videos liked by `user`, newest first.
    async fn list_liked(&self, user: &UserId) -> RecordResult<Vec<VideoRecord>>;

    /// Every record, newest first.
    async fn list_all(&self) -> RecordResult<Vec<VideoRecord>>;
}

/// Uploader subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Returns `false` if already subscribed.
    async fn subscribe(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool>;

    /// Returns `false` if there was no subscription.
    async fn unsubscribe(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool>;

    async fn is_subscribed(&self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool>;

    /// Channels `subscriber` follows.
    async fn list_subscriptions(&self, subscriber: &UserId) -> RecordResult<Vec<UserId>>;

    /// Users following `channel`.
    async fn list_subscribers(&self, channel: &UserId) -> RecordResult<Vec<UserId>>;

    async fn subscriber_count(&self, channel: &UserId) -> RecordResult<u64>;
}
