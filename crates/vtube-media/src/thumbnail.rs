//! Thumbnail extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, ToolRunner};
use crate::encode::ensure_output;
use crate::error::MediaResult;

/// Build the command grabbing one frame at `at_secs`, scaled to `width`.
pub fn thumbnail_command(source: &Path, at_secs: f64, width: u32, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(source, output)
        .seek(at_secs)
        .single_frame()
        .video_filter(format!("scale={}:-1", width))
        .log_level("error")
}

/// Extract a single scaled frame into `output`.
///
/// A timestamp past the end of the source makes FFmpeg exit cleanly without
/// writing anything, which surfaces here as a missing output.
pub async fn extract_thumbnail(
    ffmpeg: &Path,
    runner: &ToolRunner,
    source: &Path,
    at_secs: f64,
    width: u32,
    output: &Path,
) -> MediaResult<()> {
    let cmd = thumbnail_command(source, at_secs, width, output);
    runner.run_ffmpeg(ffmpeg, &cmd).await?;
    ensure_output(output).await
}
