//! Output storage for encoded variants and thumbnails.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait consumed by the ingest pipeline
//! - A local-directory implementation with atomic writes
//! - Cross-device file moves for staged outputs

pub mod error;
pub mod fs;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use fs::move_file;
pub use store::{validate_name, Bucket, LocalObjectStore, ObjectStore, StoredObject};
