//! Upload ingest worker.
//!
//! This crate provides:
//! - The ingest pipeline: intake, probe, plan, encode, thumbnail, commit
//! - Rollback of partial output through an artifact ledger
//! - A bounded executor with per-upload state and cancellation handles
//! - The orphan sweep for output left behind by crashed runs

pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod state;

pub use cancel::CancelSignal;
pub use config::{ConfigError, IngestConfig};
pub use error::{IngestError, IngestResult, IngestStage};
pub use executor::{Canceller, IngestExecutor, IngestHandle};
pub use ledger::ArtifactLedger;
pub use logging::UploadLogger;
pub use pipeline::IngestPipeline;
pub use reconcile::{sweep_orphans, SweepError, SweepReport};
pub use state::IngestState;
