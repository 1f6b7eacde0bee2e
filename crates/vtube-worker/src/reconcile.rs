//! Orphan sweep.
//!
//! A crash between encoding and commit can leave files in the output
//! buckets that no record references. The sweep deletes stored files whose
//! upload token matches no saved record, plus leftover staging directories,
//! once they are older than a minimum age.
//!
//! An upload that is still running owns a staging directory under the work
//! dir until it commits or fails. Stored files whose token still has a
//! staging directory are never swept, whatever their age.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use vtube_models::naming::token_of;
use vtube_records::{RecordError, VideoRepository};
use vtube_storage::{Bucket, ObjectStore, StorageError};

use crate::metrics;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("listing stored files failed: {0}")]
    Storage(#[from] StorageError),

    #[error("loading records failed: {0}")]
    Records(#[from] RecordError),

    #[error("scanning work directory failed: {0}")]
    Io(#[from] std::io::Error),
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Stored files examined
    pub scanned: usize,
    /// Deleted orphans as (bucket, name)
    pub removed: Vec<(Bucket, String)>,
    /// Deleted staging directories
    pub staging_removed: Vec<String>,
    /// Orphans left alone because they are too recent
    pub too_recent: usize,
    /// Unreferenced files kept because their upload still has a staging directory
    pub in_progress: usize,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.removed.len() + self.staging_removed.len()
    }
}

/// Delete unreferenced artifacts older than `min_age` as of `now`.
///
/// Files without a token prefix were not produced by the pipeline and are
/// never touched.
pub async fn sweep_orphans(
    store: &dyn ObjectStore,
    videos: &dyn VideoRepository,
    work_dir: &Path,
    min_age: Duration,
    now: DateTime<Utc>,
) -> Result<SweepReport, SweepError> {
    let records = videos.list_all().await?;
    let live_tokens: HashSet<String> = records
        .iter()
        .map(|r| r.video_id.as_str().to_string())
        .collect();
    let referenced: HashSet<&str> = records
        .iter()
        .flat_map(|r| r.referenced_files())
        .collect();
    let cutoff = now - chrono::Duration::from_std(min_age).unwrap_or(chrono::Duration::zero());

    let mut report = SweepReport::default();

    // Scanned before the buckets so an upload that commits meanwhile is seen as staging
    let staging_tokens = sweep_staging(work_dir, cutoff, &mut report).await?;

    for bucket in Bucket::ALL {
        for object in store.list(bucket).await? {
            report.scanned += 1;
            if referenced.contains(object.name.as_str()) {
                continue;
            }
            let Some(token) = token_of(&object.name) else {
                continue;
            };
            if live_tokens.contains(token) {
                continue;
            }
            if staging_tokens.contains(token) {
                report.in_progress += 1;
                continue;
            }
            if object.modified > cutoff {
                report.too_recent += 1;
                continue;
            }
            if store.delete_file(bucket, &object.name).await? {
                debug!(bucket = %bucket, name = %object.name, "Removed orphan");
                report.removed.push((bucket, object.name));
            }
        }
    }

    metrics::record_orphans_removed(report.total_removed());
    info!(
        "Orphan sweep: scanned {}, removed {} files and {} staging dirs, {} too recent, {} in progress",
        report.scanned,
        report.removed.len(),
        report.staging_removed.len(),
        report.too_recent,
        report.in_progress
    );
    Ok(report)
}

/// Remove stale staging directories. Returns the token of every staging
/// directory present when the scan started, stale or not.
async fn sweep_staging(
    work_dir: &Path,
    cutoff: DateTime<Utc>,
    report: &mut SweepReport,
) -> std::io::Result<HashSet<String>> {
    let mut tokens = HashSet::new();
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tokens),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(token) = token_of(&name) else {
            continue;
        };
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        tokens.insert(token.to_string());

        let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();
        if modified > cutoff {
            report.too_recent += 1;
            continue;
        }
        tokio::fs::remove_dir_all(entry.path()).await?;
        debug!(dir = %name, "Removed stale staging directory");
        report.staging_removed.push(name);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vtube_models::{ArtifactNames, UserId, VariantSet, VideoId, VideoRecord};
    use vtube_records::RecordStore;
    use vtube_storage::LocalObjectStore;

    fn record_for(names: &ArtifactNames) -> VideoRecord {
        let mut variants = VariantSet::new();
        variants.insert("360p", names.variant("360p"));
        VideoRecord {
            video_id: names.token().clone(),
            title: "Kept".to_string(),
            description: String::new(),
            variants,
            thumbnail_filename: names.thumbnail(),
            duration: "0:10".to_string(),
            uploader_id: UserId::from("alice"),
            views: 0,
            likes: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_orphans() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("v"), dir.path().join("t"));
        let records = RecordStore::in_memory();

        let kept = ArtifactNames::new(VideoId::new(), "kept");
        let orphan = ArtifactNames::new(VideoId::new(), "orphan");
        records.save(record_for(&kept)).await.unwrap();

        store.write_file(Bucket::Variants, &kept.variant("360p"), b"v").await.unwrap();
        store.write_file(Bucket::Thumbnails, &kept.thumbnail(), b"t").await.unwrap();
        store.write_file(Bucket::Variants, &orphan.variant("720p"), b"v").await.unwrap();
        store.write_file(Bucket::Thumbnails, &orphan.thumbnail(), b"t").await.unwrap();
        store.write_file(Bucket::Variants, "handmade.mp4", b"v").await.unwrap();

        let abandoned = VideoId::new();
        let staging = dir.path().join("work").join(format!("{}_abc123", abandoned));
        tokio::fs::create_dir_all(&staging).await.unwrap();

        // A future "now" makes every file old enough
        let later = Utc::now() + chrono::Duration::hours(2);
        let report = sweep_orphans(
            &store,
            &records,
            &dir.path().join("work"),
            Duration::from_secs(3600),
            later,
        )
        .await
        .unwrap();

        assert_eq!(report.scanned, 5);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.staging_removed.len(), 1);
        assert!(store.exists(Bucket::Variants, &kept.variant("360p")).await.unwrap());
        assert!(store.exists(Bucket::Thumbnails, &kept.thumbnail()).await.unwrap());
        assert!(store.exists(Bucket::Variants, "handmade.mp4").await.unwrap());
        assert!(!store.exists(Bucket::Variants, &orphan.variant("720p")).await.unwrap());
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn test_sweep_spares_recent_orphans() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("v"), dir.path().join("t"));
        let records = RecordStore::in_memory();

        let orphan = ArtifactNames::new(VideoId::new(), "fresh");
        store.write_file(Bucket::Variants, &orphan.variant("480p"), b"v").await.unwrap();

        let report = sweep_orphans(
            &store,
            &records,
            &dir.path().join("missing-work-dir"),
            Duration::from_secs(3600),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(report.too_recent, 1);
        assert!(report.removed.is_empty());
        assert!(store.exists(Bucket::Variants, &orphan.variant("480p")).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_keeps_files_of_running_upload() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("v"), dir.path().join("t"));
        let records = RecordStore::in_memory();
        let work_dir = dir.path().join("work");

        // Variant stored early in a long run, staging dir still present
        let running = ArtifactNames::new(VideoId::new(), "movie");
        store.write_file(Bucket::Variants, &running.variant("4K"), b"v").await.unwrap();
        tokio::fs::create_dir_all(work_dir.join(format!("{}_live", running.token())))
            .await
            .unwrap();

        let report = sweep_orphans(
            &store,
            &records,
            &work_dir,
            Duration::from_secs(3600),
            Utc::now() + chrono::Duration::minutes(90),
        )
        .await
        .unwrap();

        assert!(report.removed.is_empty());
        assert_eq!(report.in_progress, 1);
        assert!(store.exists(Bucket::Variants, &running.variant("4K")).await.unwrap());
    }
}
