//! Variant encoding.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, ToolRunner};
use crate::error::{MediaError, MediaResult};
use crate::planner;
use vtube_models::{EncodePlan, EncodingConfig};

/// Build the FFmpeg command producing one variant.
pub fn encode_command(
    source: &Path,
    plan: &EncodePlan,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    planner::verify(plan)?;
    let filter = plan
        .filter
        .to_ffmpeg()
        .ok_or_else(|| MediaError::InvalidPlan(format!("{} has no filter", plan.target.name)))?;

    Ok(FfmpegCommand::new(source, output)
        .video_filter(filter)
        .output_args(encoding.to_ffmpeg_args()))
}

/// Encode `source` into `output` according to `plan`.
///
/// A failed run may leave a partial file at `output`; removing it is up to
/// the caller.
pub async fn encode_variant(
    ffmpeg: &Path,
    runner: &ToolRunner,
    source: &Path,
    plan: &EncodePlan,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let cmd = encode_command(source, plan, output, encoding)?;
    runner.run_ffmpeg(ffmpeg, &cmd).await?;
    ensure_output(output).await?;

    info!(
        quality = plan.target.name,
        filter = %plan.filter,
        output = %output.display(),
        "Encoded variant"
    );
    Ok(())
}

/// Fail unless `path` exists and is non-empty.
pub async fn ensure_output(path: &Path) -> MediaResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(MediaError::MissingOutput(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::MissingOutput(path.to_path_buf()))
        }
        Err(e) => Err(MediaError::Io(e)),
    }
}
