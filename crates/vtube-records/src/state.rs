//! In-memory record state shared by every store backend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RecordError, RecordResult};
use crate::repository::LikeOutcome;
use vtube_models::{UserId, VideoId, VideoRecord};

/// Serializable snapshot of all records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    videos: BTreeMap<VideoId, VideoRecord>,
    /// video → users who like it
    #[serde(default)]
    likes: BTreeMap<VideoId, BTreeSet<UserId>>,
    /// (subscriber, channel)
    #[serde(default)]
    subscriptions: BTreeSet<(UserId, UserId)>,
}

impl StoreState {
    pub fn insert(&mut self, record: VideoRecord) -> RecordResult<VideoId> {
        let id = record.video_id.clone();
        if self.videos.contains_key(&id) {
            return Err(RecordError::AlreadyExists(id.to_string()));
        }
        self.videos.insert(id.clone(), record);
        Ok(id)
    }

    pub fn get(&self, id: &VideoId) -> Option<&VideoRecord> {
        self.videos.get(id)
    }

    pub fn increment_views(&mut self, id: &VideoId) -> RecordResult<u64> {
        let record = self
            .videos
            .get_mut(id)
            .ok_or_else(|| RecordError::not_found(id.as_str()))?;
        record.views = record.views.saturating_add(1);
        Ok(record.views)
    }

    pub fn toggle_like(&mut self, id: &VideoId, user: &UserId) -> RecordResult<LikeOutcome> {
        let record = self
            .videos
            .get_mut(id)
            .ok_or_else(|| RecordError::not_found(id.as_str()))?;

        let likers = self.likes.entry(id.clone()).or_default();
        let liked = if likers.remove(user) {
            false
        } else {
            likers.insert(user.clone());
            true
        };
        record.likes = likers.len() as u64;
        if likers.is_empty() {
            self.likes.remove(id);
        }

        Ok(LikeOutcome {
            liked,
            likes: record.likes,
        })
    }

    pub fn has_liked(&self, id: &VideoId, user: &UserId) -> bool {
        self.likes.get(id).is_some_and(|likers| likers.contains(user))
    }

    pub fn list_by_uploader(&self, user: &UserId) -> Vec<VideoRecord> {
        newest_first(self.videos.values().filter(|r| &r.uploader_id == user))
    }

    pub fn list_liked(&self, user: &UserId) -> Vec<VideoRecord> {
        newest_first(
            self.videos
                .values()
                .filter(|r| self.has_liked(&r.video_id, user)),
        )
    }

    pub fn list_all(&self) -> Vec<VideoRecord> {
        newest_first(self.videos.values())
    }

    pub fn subscribe(&mut self, subscriber: &UserId, channel: &UserId) -> RecordResult<bool> {
        if subscriber == channel {
            return Err(RecordError::SelfSubscription(subscriber.to_string()));
        }
        Ok(self
            .subscriptions
            .insert((subscriber.clone(), channel.clone())))
    }

    pub fn unsubscribe(&mut self, subscriber: &UserId, channel: &UserId) -> bool {
        self.subscriptions
            .remove(&(subscriber.clone(), channel.clone()))
    }

    pub fn is_subscribed(&self, subscriber: &UserId, channel: &UserId) -> bool {
        self.subscriptions
            .contains(&(subscriber.clone(), channel.clone()))
    }

    pub fn list_subscriptions(&self, subscriber: &UserId) -> Vec<UserId> {
        self.subscriptions
            .iter()
            .filter(|(s, _)| s == subscriber)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn list_subscribers(&self, channel: &UserId) -> Vec<UserId> {
        self.subscriptions
            .iter()
            .filter(|(_, c)| c == channel)
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

fn newest_first<'a>(records: impl Iterator<Item = &'a VideoRecord>) -> Vec<VideoRecord> {
    let mut out: Vec<VideoRecord> = records.cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}
