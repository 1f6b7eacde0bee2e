//! Pipeline integration tests.
//!
//! The media toolchain is replaced by `FakeTools`, which writes small
//! placeholder files and can be scripted to fail or hang per quality.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio_test::{assert_err, assert_ok};

use vtube_media::{MediaError, MediaResult, MediaTools, ProbeResult};
use vtube_models::{
    EncodePlan, SourceGeometry, UploadRejection, UploadRequest, UserId, VideoId, VideoRecord,
};
use vtube_records::{LikeOutcome, RecordError, RecordResult, RecordStore, VideoRepository};
use vtube_storage::{Bucket, LocalObjectStore, ObjectStore, StorageError, StorageResult, StoredObject};
use vtube_worker::{
    CancelSignal, IngestConfig, IngestError, IngestExecutor, IngestPipeline, IngestStage,
    IngestState,
};

const SOURCE: &[u8] = b"not really a video, but enough bytes to stage";

struct FakeTools {
    geometry: SourceGeometry,
    duration_secs: f64,
    fail_probe: bool,
    fail_encode: Vec<&'static str>,
    hang_encode: Option<&'static str>,
    timeout_encode: Option<&'static str>,
    fail_thumbnail: bool,
    encoded: Mutex<Vec<(String, String)>>,
    thumbnails: AtomicUsize,
}

impl FakeTools {
    fn new(width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            geometry: SourceGeometry::new(width, height).unwrap(),
            duration_secs,
            fail_probe: false,
            fail_encode: Vec::new(),
            hang_encode: None,
            timeout_encode: None,
            fail_thumbnail: false,
            encoded: Mutex::new(Vec::new()),
            thumbnails: AtomicUsize::new(0),
        }
    }

    fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    fn failing_encode(mut self, quality: &'static str) -> Self {
        self.fail_encode.push(quality);
        self
    }

    fn hanging_encode(mut self, quality: &'static str) -> Self {
        self.hang_encode = Some(quality);
        self
    }

    fn timing_out_encode(mut self, quality: &'static str) -> Self {
        self.timeout_encode = Some(quality);
        self
    }

    fn failing_thumbnail(mut self) -> Self {
        self.fail_thumbnail = true;
        self
    }

    /// (quality, filter) for every encode attempted.
    fn encoded(&self) -> Vec<(String, String)> {
        self.encoded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTools for FakeTools {
    async fn probe(&self, source: &Path) -> MediaResult<ProbeResult> {
        assert!(source.exists(), "probe ran before the upload was staged");
        if self.fail_probe {
            return Err(MediaError::NoVideoStream(source.to_path_buf()));
        }
        Ok(ProbeResult {
            geometry: self.geometry,
            duration_secs: self.duration_secs,
        })
    }

    async fn encode(&self, _source: &Path, plan: &EncodePlan, output: &Path) -> MediaResult<()> {
        let quality = plan.target.name;
        self.encoded
            .lock()
            .unwrap()
            .push((quality.to_string(), plan.filter.to_string()));

        if self.hang_encode == Some(quality) {
            std::future::pending::<()>().await;
        }
        if self.timeout_encode == Some(quality) {
            return Err(MediaError::Timeout {
                tool: "ffmpeg".to_string(),
                timeout: Duration::from_secs(1800),
            });
        }
        if self.fail_encode.contains(&quality) {
            return Err(MediaError::tool_failed("ffmpeg", Some(1), "encoder exploded"));
        }
        tokio::fs::write(output, format!("{} variant", quality)).await?;
        Ok(())
    }

    async fn extract_thumbnail(&self, _source: &Path, _at_secs: f64, output: &Path) -> MediaResult<()> {
        self.thumbnails.fetch_add(1, Ordering::SeqCst);
        if self.fail_thumbnail {
            return Err(MediaError::tool_failed("ffmpeg", Some(1), "no frame at 1s"));
        }
        tokio::fs::write(output, b"png").await?;
        Ok(())
    }
}

/// Repository whose saves always fail.
struct FailingRepo;

#[async_trait]
impl VideoRepository for FailingRepo {
    async fn save(&self, _record: VideoRecord) -> RecordResult<VideoId> {
        Err(RecordError::persist_failed("disk full"))
    }

    async fn get(&self, _video_id: &VideoId) -> RecordResult<Option<VideoRecord>> {
        Ok(None)
    }

    async fn increment_views(&self, video_id: &VideoId) -> RecordResult<u64> {
        Err(RecordError::not_found(video_id.as_str()))
    }

    async fn toggle_like(&self, video_id: &VideoId, _user: &UserId) -> RecordResult<LikeOutcome> {
        Err(RecordError::not_found(video_id.as_str()))
    }

    async fn has_liked(&self, _video_id: &VideoId, _user: &UserId) -> RecordResult<bool> {
        Ok(false)
    }

    async fn list_by_uploader(&self, _user: &UserId) -> RecordResult<Vec<VideoRecord>> {
        Ok(Vec::new())
    }

    async fn list_liked(&self, _user: &UserId) -> RecordResult<Vec<VideoRecord>> {
        Ok(Vec::new())
    }

    async fn list_all(&self) -> RecordResult<Vec<VideoRecord>> {
        Ok(Vec::new())
    }
}

/// Local store whose deletes always fail.
struct StickyStore(LocalObjectStore);

#[async_trait]
impl ObjectStore for StickyStore {
    async fn write_file(&self, bucket: Bucket, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.0.write_file(bucket, name, bytes).await
    }

    async fn put_file(&self, bucket: Bucket, name: &str, src: &Path) -> StorageResult<()> {
        self.0.put_file(bucket, name, src).await
    }

    async fn delete_file(&self, _bucket: Bucket, name: &str) -> StorageResult<bool> {
        Err(StorageError::DeleteFailed {
            name: name.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    async fn exists(&self, bucket: Bucket, name: &str) -> StorageResult<bool> {
        self.0.exists(bucket, name).await
    }

    async fn list(&self, bucket: Bucket) -> StorageResult<Vec<StoredObject>> {
        self.0.list(bucket).await
    }
}

struct Harness {
    _dir: TempDir,
    work_dir: PathBuf,
    store: Arc<LocalObjectStore>,
    records: Arc<RecordStore>,
    tools: Arc<FakeTools>,
    pipeline: IngestPipeline,
}

impl Harness {
    fn new(tools: FakeTools) -> Self {
        Self::with_repo(tools, None)
    }

    fn with_repo(tools: FakeTools, repo: Option<Arc<dyn VideoRepository>>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = IngestConfig {
            work_dir: dir.path().join("work"),
            variants_dir: dir.path().join("videos"),
            thumbnails_dir: dir.path().join("thumbnails"),
            records_path: dir.path().join("records.json"),
            ..Default::default()
        };
        let store = Arc::new(LocalObjectStore::new(
            config.variants_dir.clone(),
            config.thumbnails_dir.clone(),
        ));
        let records = Arc::new(RecordStore::in_memory());
        let tools = Arc::new(tools);
        let repo = match repo {
            Some(repo) => repo,
            None => records.clone() as Arc<dyn VideoRepository>,
        };

        Self {
            work_dir: config.work_dir.clone(),
            pipeline: IngestPipeline::new(config, tools.clone(), store.clone(), repo),
            _dir: dir,
            store,
            records,
            tools,
        }
    }

    async fn stored(&self, bucket: Bucket) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .list(bucket)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        names.sort();
        names
    }

    async fn assert_nothing_left(&self) {
        assert!(self.stored(Bucket::Variants).await.is_empty());
        assert!(self.stored(Bucket::Thumbnails).await.is_empty());
        assert!(self.records.list_all().await.unwrap().is_empty());
        assert!(staging_entries(&self.work_dir).is_empty());
    }
}

fn staging_entries(work_dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(work_dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn request(filename: &str) -> UploadRequest {
    UploadRequest::new("Holiday", filename, UserId::from("alice"))
}

#[tokio::test]
async fn test_full_hd_upload_commits_four_variants() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.4));
    let (state, state_rx) = watch::channel(IngestState::Received);
    let token = VideoId::new();

    let record = assert_ok!(
        h.pipeline
            .ingest_with(token.clone(), request("holiday.mp4"), SOURCE, &state, CancelSignal::never())
            .await
    );

    assert_eq!(record.video_id, token);
    assert_eq!(record.variants.qualities(), vec!["1080p", "720p", "480p", "360p"]);
    assert_eq!(record.duration, "0:30");
    assert_eq!(record.thumbnail_filename, format!("{}_holiday.png", token));
    assert_eq!(
        record.variants.get("720p"),
        Some(format!("{}_holiday_720p.mp4", token).as_str())
    );
    assert_eq!(record.views, 0);
    assert_eq!(record.likes, 0);

    // 4K and QHD would upscale and are never attempted
    let encoded: Vec<String> = h.tools.encoded().into_iter().map(|(q, _)| q).collect();
    assert_eq!(encoded, vec!["1080p", "720p", "480p", "360p"]);

    assert_eq!(h.stored(Bucket::Variants).await.len(), 4);
    assert_eq!(
        h.stored(Bucket::Thumbnails).await,
        vec![format!("{}_holiday.png", token)]
    );
    assert_eq!(h.records.get(&token).await.unwrap(), Some(record));
    assert!(staging_entries(&h.work_dir).is_empty());
    assert_eq!(
        *state_rx.borrow(),
        IngestState::Committed { video_id: token }
    );
}

#[tokio::test]
async fn test_letterboxed_source_is_padded() {
    let h = Harness::new(FakeTools::new(1920, 804, 12.0));
    assert_ok!(h.pipeline.ingest(request("scope.mkv"), SOURCE).await);

    let encoded = h.tools.encoded();
    let (_, filter) = encoded.iter().find(|(q, _)| q == "720p").unwrap();
    assert_eq!(filter, "scale=1280:536,pad=1280:720:0:92");
}

#[tokio::test]
async fn test_required_failure_rolls_back_everything() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0).failing_encode("480p"));

    let err = assert_err!(h.pipeline.ingest(request("holiday.mp4"), SOURCE).await);
    assert!(matches!(&err, IngestError::Encode { quality, .. } if quality == "480p"));
    assert_eq!(err.stage(), IngestStage::Encode);

    // 1080p and 720p were stored before 480p failed
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_optional_failure_is_omitted() {
    let h = Harness::new(FakeTools::new(3840, 2160, 95.0).failing_encode("4K"));

    let record = assert_ok!(h.pipeline.ingest(request("uhd.mov"), SOURCE).await);
    assert_eq!(
        record.variants.qualities(),
        vec!["QHD", "1080p", "720p", "480p", "360p"]
    );
    assert_eq!(record.duration, "1:35");
    assert_eq!(h.stored(Bucket::Variants).await.len(), 5);

    let labels: Vec<&str> = record
        .available_qualities()
        .iter()
        .map(|link| link.target.label)
        .collect();
    assert_eq!(labels, vec!["1440p", "1080p", "720p", "480p", "360p"]);
}

#[tokio::test]
async fn test_small_source_encodes_only_matching_rung() {
    let h = Harness::new(FakeTools::new(640, 360, 4.0));

    let record = assert_ok!(h.pipeline.ingest(request("tiny.avi"), SOURCE).await);
    assert_eq!(record.variants.qualities(), vec!["360p"]);
    assert_eq!(h.tools.encoded().len(), 1);
}

#[tokio::test]
async fn test_caller_thumbnail_skips_extraction() {
    let h = Harness::new(FakeTools::new(1280, 720, 8.0));
    let upload = request("clip.mp4").with_thumbnail("Cover Art.jpg", b"jpeg".to_vec());

    let record = assert_ok!(h.pipeline.ingest(upload, SOURCE).await);
    assert_eq!(
        record.thumbnail_filename,
        format!("{}_Cover_Art.jpg", record.video_id)
    );
    assert_eq!(h.tools.thumbnails.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.stored(Bucket::Thumbnails).await,
        vec![record.thumbnail_filename.clone()]
    );
}

#[tokio::test]
async fn test_probe_failure_stores_nothing() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0).failing_probe());

    let err = assert_err!(h.pipeline.ingest(request("broken.mp4"), SOURCE).await);
    assert!(matches!(err, IngestError::Probe(MediaError::NoVideoStream(_))));
    assert!(h.tools.encoded().is_empty());
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_thumbnail_failure_rolls_back_variants() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0).failing_thumbnail());

    let err = assert_err!(h.pipeline.ingest(request("holiday.mp4"), SOURCE).await);
    assert_eq!(err.stage(), IngestStage::Thumbnail);
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_persist_failure_rolls_back_artifacts() {
    let h = Harness::with_repo(FakeTools::new(1920, 1080, 30.0), Some(Arc::new(FailingRepo)));

    let err = assert_err!(h.pipeline.ingest(request("holiday.mp4"), SOURCE).await);
    assert!(matches!(err, IngestError::Persist(_)));
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_disallowed_extension_is_rejected_before_staging() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0));

    let err = assert_err!(h.pipeline.ingest(request("notes.txt"), SOURCE).await);
    assert!(matches!(
        err,
        IngestError::Rejected(UploadRejection::DisallowedExtension(_))
    ));
    assert!(!h.work_dir.exists());
}

#[tokio::test]
async fn test_empty_upload_fails_intake() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0));

    let err = assert_err!(h.pipeline.ingest(request("empty.mp4"), &b""[..]).await);
    assert!(matches!(err, IngestError::Intake(_)));
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_concurrent_uploads_use_disjoint_names() {
    let h = Harness::new(FakeTools::new(1280, 720, 10.0));
    let executor = IngestExecutor::new(h.pipeline.clone());

    let first = executor.submit(request("same.mp4"), SOURCE);
    let second = executor.submit(request("same.mp4"), SOURCE);
    assert_ne!(first.video_id(), second.video_id());

    let a = assert_ok!(first.result().await);
    let b = assert_ok!(second.result().await);

    let a_files: Vec<&str> = a.variants.filenames().collect();
    assert!(b.variants.filenames().all(|name| !a_files.contains(&name)));
    assert_ne!(a.thumbnail_filename, b.thumbnail_filename);

    // 720p and 480p and 360p for each upload
    assert_eq!(h.stored(Bucket::Variants).await.len(), 6);
    assert_eq!(h.records.list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancel_during_encode_rolls_back() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0).hanging_encode("720p"));
    let executor = IngestExecutor::new(h.pipeline.clone());

    let handle = executor.submit(request("holiday.mp4"), SOURCE);
    let mut states = handle.subscribe();
    states
        .wait_for(|s| matches!(s, IngestState::Encoding { quality: "720p", .. }))
        .await
        .unwrap();

    handle.cancel();
    let state = handle.subscribe();
    let err = assert_err!(handle.result().await);
    assert!(matches!(err, IngestError::Cancelled(IngestStage::Encode)));
    assert!(matches!(
        &*state.borrow(),
        IngestState::Failed {
            stage: IngestStage::Encode,
            ..
        }
    ));

    executor.wait_idle().await;
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_tool_timeout_fails_like_any_error() {
    let h = Harness::new(FakeTools::new(1920, 1080, 30.0).timing_out_encode("720p"));
    let (state, state_rx) = watch::channel(IngestState::Received);

    let err = assert_err!(
        h.pipeline
            .ingest_with(VideoId::new(), request("holiday.mp4"), SOURCE, &state, CancelSignal::never())
            .await
    );
    assert!(err.is_timeout());
    assert_eq!(err.outcome(), "timeout");
    assert!(matches!(
        &*state_rx.borrow(),
        IngestState::Failed {
            stage: IngestStage::Encode,
            ..
        }
    ));
    h.assert_nothing_left().await;
}

#[tokio::test]
async fn test_long_source_filename_commits() {
    let h = Harness::new(FakeTools::new(1280, 720, 10.0));
    let filename = format!("{}.mp4", "a".repeat(230));

    let record = assert_ok!(h.pipeline.ingest(request(&filename), SOURCE).await);
    for name in record.variants.filenames() {
        assert!(name.len() < 255, "{}", name);
    }
    assert!(record.thumbnail_filename.len() < 255);
}

#[tokio::test]
async fn test_caller_thumbnail_with_part_suffix() {
    let h = Harness::new(FakeTools::new(1280, 720, 10.0));
    let upload = request("clip.mp4").with_thumbnail("cover.part", b"jpeg".to_vec());

    let record = assert_ok!(h.pipeline.ingest(upload, SOURCE).await);
    assert_eq!(
        record.thumbnail_filename,
        format!("{}_cover.part", record.video_id)
    );
    assert_eq!(
        h.stored(Bucket::Thumbnails).await,
        vec![record.thumbnail_filename.clone()]
    );
}

#[tokio::test]
async fn test_optional_cleanup_failure_does_not_abort() {
    let dir = TempDir::new().unwrap();
    let config = IngestConfig {
        work_dir: dir.path().join("work"),
        ..Default::default()
    };
    let store = Arc::new(StickyStore(LocalObjectStore::new(
        dir.path().join("videos"),
        dir.path().join("thumbnails"),
    )));
    let records = Arc::new(RecordStore::in_memory());
    let pipeline = IngestPipeline::new(
        config,
        Arc::new(FakeTools::new(3840, 2160, 20.0).failing_encode("4K")),
        store,
        records,
    );

    let record = assert_ok!(pipeline.ingest(request("uhd.mp4"), SOURCE).await);
    assert!(!record.variants.contains("4K"));
    assert_eq!(record.variants.len(), 5);
}
