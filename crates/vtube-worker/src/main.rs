//! Upload ingest worker binary.
//!
//! `vtube-worker <video>...` ingests each file and prints the committed
//! records as JSON. `vtube-worker sweep` removes orphaned output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vtube_media::{resolve_tool, FfmpegTools};
use vtube_models::{UploadRequest, UserId};
use vtube_records::RecordStore;
use vtube_storage::LocalObjectStore;
use vtube_worker::{sweep_orphans, IngestConfig, IngestExecutor, IngestPipeline};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    init_metrics();

    info!("Starting vtube-worker");

    let mut config = IngestConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Fail fast when either tool is missing
    for (tool, path) in [
        ("ffmpeg", &mut config.ffmpeg_path),
        ("ffprobe", &mut config.ffprobe_path),
    ] {
        match resolve_tool(tool, Some(path.as_path())) {
            Ok(resolved) => *path = resolved,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
    info!("Ingest config: {:?}", config);

    let store = Arc::new(LocalObjectStore::new(
        config.variants_dir.clone(),
        config.thumbnails_dir.clone(),
    ));
    if let Err(e) = store.ensure_dirs().await {
        error!("Failed to create output directories: {}", e);
        std::process::exit(1);
    }

    let records = match RecordStore::open(config.records_path.clone()).await {
        Ok(records) => Arc::new(records),
        Err(e) => {
            error!("Failed to open record store: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("sweep") {
        match sweep_orphans(
            store.as_ref(),
            records.as_ref(),
            &config.work_dir,
            config.sweep_min_age,
            chrono::Utc::now(),
        )
        .await
        {
            Ok(report) => print_json(&report),
            Err(e) => {
                error!("Orphan sweep failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.is_empty() {
        eprintln!("usage: vtube-worker <video>... | vtube-worker sweep");
        std::process::exit(2);
    }

    let tools = FfmpegTools::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
        .with_timeout(config.tool_timeout)
        .with_process_limit(Arc::new(Semaphore::new(config.max_tool_processes)))
        .with_encoding(config.encoding.clone());
    let uploader = UserId::new(config.uploader_id.clone());

    let executor = IngestExecutor::new(IngestPipeline::new(
        config,
        Arc::new(tools),
        store,
        records,
    ));

    let mut failures = 0usize;
    let mut handles = Vec::new();
    for arg in args {
        let path = PathBuf::from(arg);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                error!("Cannot open {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        let handle = executor.submit(request_for(&path, uploader.clone()), file);
        info!(video_id = %handle.video_id(), "Queued {}", path.display());
        handles.push((path, handle));
    }

    // Cancel everything still running on Ctrl+C
    let cancellers: Vec<_> = handles.iter().map(|(_, h)| h.canceller()).collect();
    let shutdown_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling {} uploads", cancellers.len());
            for canceller in &cancellers {
                canceller.cancel();
            }
        }
    });

    for (path, handle) in handles {
        match handle.result().await {
            Ok(record) => print_json(&record),
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    shutdown_handle.abort();
    executor.wait_idle().await;

    info!("Worker shutdown complete");
    if failures > 0 {
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vtube=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Serve Prometheus metrics on `METRICS_ADDR` when set.
fn init_metrics() {
    let Ok(addr) = std::env::var("METRICS_ADDR") else {
        return;
    };
    let addr: std::net::SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Ignoring METRICS_ADDR {:?}: {}", addr, e);
            return;
        }
    };

    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!("Serving metrics on {}", addr),
        Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
    }
}

/// Title is the file stem, as a user uploading from disk would name it.
fn request_for(path: &Path, uploader: UserId) -> UploadRequest {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    UploadRequest::new(title, filename, uploader)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}
