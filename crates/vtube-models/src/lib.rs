//! Shared data models for the VTube ingest backend.
//!
//! This crate provides Serde-serializable types for:
//! - The quality ladder and per-upload encode plans
//! - Video records and their variant sets
//! - Encoding policy and thumbnail settings
//! - Upload requests, validation and artifact naming
//! - Duration string formatting

pub mod duration;
pub mod encoding;
pub mod geometry;
pub mod naming;
pub mod quality;
pub mod upload;
pub mod video;

// Re-export common types
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use encoding::EncodingConfig;
pub use geometry::{EncodePlan, FilterGraph, PadBox, SourceGeometry};
pub use naming::ArtifactNames;
pub use quality::{QualityTarget, QUALITY_LADDER, REQUIRED_QUALITIES};
pub use upload::{CallerThumbnail, UploadRejection, UploadRequest, ALLOWED_EXTENSIONS};
pub use video::{QualityLink, UserId, VariantSet, VideoId, VideoRecord};
