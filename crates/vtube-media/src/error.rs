//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Maximum number of stderr bytes kept on a failed tool invocation.
const STDERR_TAIL_BYTES: usize = 2048;

/// Errors that can occur while driving the external media tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found: {detail}")]
    ToolNotFound { tool: String, detail: String },

    #[error("{tool} failed ({}): {stderr}", describe_exit(.exit_code))]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {:.1}s", .timeout.as_secs_f64())]
    Timeout { tool: String, timeout: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid probe output: {0}")]
    InvalidProbeOutput(String),

    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    #[error("Tool produced no output file: {0}")]
    MissingOutput(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid encode plan: {0}")]
    InvalidPlan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a tool failure error, keeping only the tail of stderr.
    pub fn tool_failed(tool: impl Into<String>, exit_code: Option<i32>, stderr: &str) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            exit_code,
            stderr: stderr_tail(stderr),
        }
    }

    /// Exit code of a failed tool run, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ToolFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Trailing part of a diagnostic stream, cut on a char boundary.
pub(crate) fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
