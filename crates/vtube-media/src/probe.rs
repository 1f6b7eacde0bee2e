//! FFprobe source inspection.
//!
//! Geometry and duration are read with two separate invocations, one per
//! output format, so each parse step stays trivial.

use serde::Serialize;
use std::path::Path;

use crate::command::ToolRunner;
use crate::error::{MediaError, MediaResult};
use vtube_models::{format_duration, SourceGeometry};

/// Result of probing an uploaded source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeResult {
    pub geometry: SourceGeometry,
    /// Container duration in seconds
    pub duration_secs: f64,
}

impl ProbeResult {
    /// Duration rendered as `M:SS` / `H:MM:SS`.
    pub fn duration_string(&self) -> String {
        format_duration(self.duration_secs)
    }
}

/// Arguments selecting width and height of the first video stream as CSV.
pub fn geometry_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Arguments printing the container duration as a bare number.
pub fn duration_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parse `W,H` output. Empty output means the file has no video stream.
pub fn parse_geometry(stdout: &str, path: &Path) -> MediaResult<SourceGeometry> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
    let Some(line) = line else {
        return Err(MediaError::NoVideoStream(path.to_path_buf()));
    };

    // Some ffprobe builds emit a trailing separator
    let fields: Vec<&str> = line.split(',').filter(|f| !f.is_empty()).collect();
    let (width, height) = match fields[..] {
        [w, h] => (parse_dimension(w, line)?, parse_dimension(h, line)?),
        _ => {
            return Err(MediaError::InvalidProbeOutput(format!(
                "expected width,height, got {:?}",
                line
            )))
        }
    };

    SourceGeometry::new(width, height).ok_or_else(|| {
        MediaError::InvalidProbeOutput(format!("zero dimension in {:?}", line))
    })
}

fn parse_dimension(raw: &str, line: &str) -> MediaResult<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| MediaError::InvalidProbeOutput(format!("bad dimension in {:?}", line)))
}

/// Parse an unwrapped numeric duration.
pub fn parse_duration_secs(stdout: &str) -> MediaResult<f64> {
    let raw = stdout.trim();
    let secs: f64 = raw
        .parse()
        .map_err(|_| MediaError::InvalidProbeOutput(format!("bad duration {:?}", raw)))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(MediaError::InvalidProbeOutput(format!(
            "bad duration {:?}",
            raw
        )));
    }
    Ok(secs)
}

/// Probe `path` for its video geometry and duration.
pub async fn probe_source(
    ffprobe: &Path,
    runner: &ToolRunner,
    path: &Path,
) -> MediaResult<ProbeResult> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let geometry_out = runner.run(ffprobe, &geometry_args(path)).await?;
    let geometry = parse_geometry(&geometry_out.stdout, path)?;

    let duration_out = runner.run(ffprobe, &duration_args(path)).await?;
    let duration_secs = parse_duration_secs(&duration_out.stdout)?;

    Ok(ProbeResult {
        geometry,
        duration_secs,
    })
}
