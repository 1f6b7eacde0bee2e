//! FFmpeg command builder and external tool runner.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-vframes").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools as subprocesses with timeout, cancellation and an
/// optional shared process limit.
///
/// Children are spawned with `kill_on_drop`, so abandoning a run (timeout,
/// cancellation or the caller's future being dropped) terminates the process.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Per-invocation timeout
    timeout: Option<Duration>,
    /// Permits shared by every runner allowed to spawn tools
    permits: Option<Arc<Semaphore>>,
}

impl ToolRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Share a process limit with other runners.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run_ffmpeg(&self, ffmpeg: &Path, cmd: &FfmpegCommand) -> MediaResult<ToolOutput> {
        self.run(ffmpeg, &cmd.build_args()).await
    }

    /// Run `program` with `args`, failing on non-zero exit.
    pub async fn run(&self, program: &Path, args: &[String]) -> MediaResult<ToolOutput> {
        let tool = tool_name(program);

        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| MediaError::Cancelled)?,
            ),
            None => None,
        };

        debug!("Running {}: {} {}", tool, program.display(), args.join(" "));
        let started = Instant::now();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::ToolNotFound {
                    tool: tool.clone(),
                    detail: program.display().to_string(),
                },
                _ => MediaError::Io(e),
            })?;

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let output = tokio::select! {
            result = &mut wait => result?,
            _ = sleep_or_forever(self.timeout) => {
                let timeout = self.timeout.unwrap_or_default();
                warn!("{} timed out after {:?}, killing process", tool, timeout);
                metrics::counter!("vtube_tool_runs_total", "tool" => tool.clone(), "outcome" => "timeout")
                    .increment(1);
                return Err(MediaError::Timeout { tool, timeout });
            }
            _ = cancelled(self.cancel_rx.clone()) => {
                debug!("{} cancelled, killing process", tool);
                return Err(MediaError::Cancelled);
            }
        };

        metrics::histogram!("vtube_tool_duration_seconds", "tool" => tool.clone())
            .record(started.elapsed().as_secs_f64());

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            metrics::counter!("vtube_tool_runs_total", "tool" => tool, "outcome" => "success")
                .increment(1);
            Ok(ToolOutput { stdout, stderr })
        } else {
            metrics::counter!("vtube_tool_runs_total", "tool" => tool.clone(), "outcome" => "failure")
                .increment(1);
            Err(MediaError::tool_failed(tool, output.status.code(), &stderr))
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => pending().await,
    }
}

/// Resolves once the cancel flag is set. Never resolves without a receiver
/// or after the sender is gone.
async fn cancelled(cancel_rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel_rx else {
        return pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return pending().await;
        }
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string())
}

/// Resolve a tool from an explicit path or by searching `PATH`.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> MediaResult<PathBuf> {
    let target = configured.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(name));
    which::which(&target).map_err(|e| MediaError::ToolNotFound {
        tool: name.to_string(),
        detail: format!("{}: {}", target.display(), e),
    })
}

/// Verify both external tools are reachable.
pub fn check_tools(ffmpeg: &Path, ffprobe: &Path) -> MediaResult<()> {
    resolve_tool("ffmpeg", Some(ffmpeg))?;
    resolve_tool("ffprobe", Some(ffprobe))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.png")
            .seek(1.0)
            .single_frame()
            .video_filter("scale=320:-1");

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-ss", "1.000", "-i", "input.mp4", "-vframes", "1", "-vf",
                "scale=320:-1", "output.png"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = ToolRunner::new()
            .run(Path::new("sh"), &sh("echo 1920,1080"))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "1920,1080");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code_and_stderr() {
        let err = ToolRunner::new()
            .run(Path::new("sh"), &sh("echo 'moov atom not found' >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            MediaError::ToolFailed {
                tool,
                exit_code,
                stderr,
            } => {
                assert_eq!(tool, "sh");
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "moov atom not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let started = Instant::now();
        let err = ToolRunner::new()
            .with_timeout(Duration::from_millis(200))
            .run(Path::new("sh"), &sh("sleep 10"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let (tx, rx) = watch::channel(false);
        let runner = ToolRunner::new().with_cancel(rx);
        let handle = tokio::spawn(async move { runner.run(Path::new("sh"), &sh("sleep 10")).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let err = ToolRunner::new()
            .run(Path::new("/nonexistent/ffprobe"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound { .. }));
        assert!(resolve_tool("ffprobe", Some(Path::new("/nonexistent/ffprobe"))).is_err());
    }
}
