//! FFmpeg CLI wrapper for upload ingest.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A subprocess runner with timeout, cancellation and a shared process limit
//! - Source probing (geometry and duration)
//! - Scale/pad planning across the quality ladder
//! - Variant encoding and thumbnail extraction
//! - The [`MediaTools`] trait the ingest pipeline is written against

pub mod command;
pub mod encode;
pub mod error;
pub mod planner;
pub mod probe;
pub mod thumbnail;
pub mod tools;

pub use command::{check_tools, resolve_tool, FfmpegCommand, ToolOutput, ToolRunner};
pub use encode::{encode_command, encode_variant, ensure_output};
pub use error::{MediaError, MediaResult};
pub use planner::{plan, plan_ladder};
pub use probe::{probe_source, ProbeResult};
pub use thumbnail::{extract_thumbnail, thumbnail_command};
pub use tools::{FfmpegTools, MediaTools};
