//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::quality::{QualityTarget, QUALITY_LADDER};

/// Opaque per-upload token. Doubles as the video ID and is embedded in every
/// generated filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID (32 lowercase hex characters).
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Uploader / viewer identity, issued by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Quality name → variant filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VariantSet(BTreeMap<String, String>);

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quality: impl Into<String>, filename: impl Into<String>) {
        self.0.insert(quality.into(), filename.into());
    }

    pub fn get(&self, quality: &str) -> Option<&str> {
        self.0.get(quality).map(String::as_str)
    }

    pub fn contains(&self, quality: &str) -> bool {
        self.0.contains_key(quality)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Quality names present, in ladder order.
    pub fn qualities(&self) -> Vec<&'static str> {
        QUALITY_LADDER
            .iter()
            .filter(|q| self.contains(q.name))
            .map(|q| q.name)
            .collect()
    }

    /// All filenames, in no particular order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

/// A playable rendition of a committed video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityLink {
    pub target: QualityTarget,
    pub filename: String,
}

/// Persisted result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub variants: VariantSet,
    pub thumbnail_filename: String,
    /// `M:SS` or `H:MM:SS`
    pub duration: String,
    pub uploader_id: UserId,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Renditions present on this record, highest quality first.
    pub fn available_qualities(&self) -> Vec<QualityLink> {
        QUALITY_LADDER
            .iter()
            .filter_map(|target| {
                self.variants.get(target.name).map(|filename| QualityLink {
                    target: *target,
                    filename: filename.to_string(),
                })
            })
            .collect()
    }

    /// Every object-store filename the record references.
    pub fn referenced_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.variants.filenames().collect();
        files.push(&self.thumbnail_filename);
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> VideoRecord {
        let mut variants = VariantSet::new();
        variants.insert("360p", "abc_clip_360p.mp4");
        variants.insert("1080p", "abc_clip_1080p.mp4");
        variants.insert("720p", "abc_clip_720p.mp4");
        VideoRecord {
            video_id: VideoId::from("abc"),
            title: "clip".to_string(),
            description: String::new(),
            variants,
            thumbnail_filename: "abc_clip.png".to_string(),
            duration: "0:30".to_string(),
            uploader_id: UserId::from("u1"),
            views: 0,
            likes: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_video_id_is_hex_token() {
        let id = VideoId::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, VideoId::new());
    }

    #[test]
    fn test_qualities_in_ladder_order() {
        let rec = record();
        assert_eq!(rec.variants.qualities(), vec!["1080p", "720p", "360p"]);

        let labels: Vec<&str> = rec
            .available_qualities()
            .iter()
            .map(|l| l.target.label)
            .collect();
        assert_eq!(labels, vec!["1080p", "720p", "360p"]);
    }

    #[test]
    fn test_referenced_files_include_thumbnail() {
        let rec = record();
        let files = rec.referenced_files();
        assert_eq!(files.len(), 4);
        assert!(files.contains(&"abc_clip.png"));
    }

    #[test]
    fn test_record_json_round_trip() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: VideoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
