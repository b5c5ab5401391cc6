//! Seam between the pipeline and the external `ffmpeg`/`ffprobe` binaries.
//!
//! Everything above this module talks to a [`MediaEngine`]; only
//! [`FfmpegEngine`] spawns processes.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Invocations the pipeline needs from the media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Raw output of `ffmpeg -hide_banner -encoders`.
    async fn list_encoders(&self) -> MediaResult<String>;

    /// Raw JSON of `ffprobe -show_format -show_streams` for `path`.
    async fn probe_json(&self, path: &Path) -> MediaResult<Vec<u8>>;

    /// Run a transcode to completion. Non-zero exit is an error carrying stderr.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Process-backed engine with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn output_with_timeout(
        &self,
        command: &mut Command,
    ) -> MediaResult<std::process::Output> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(MediaError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn list_encoders(&self) -> MediaResult<String> {
        check_ffmpeg()?;

        let output = self
            .output_with_timeout(Command::new("ffmpeg").args(["-hide_banner", "-encoders"]))
            .await?;

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                "ffmpeg -encoders failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn probe_json(&self, path: &Path) -> MediaResult<Vec<u8>> {
        check_ffprobe()?;
        debug!(path = %path.display(), "Running ffprobe");

        let output = self
            .output_with_timeout(
                Command::new("ffprobe")
                    .args([
                        "-v",
                        "quiet",
                        "-print_format",
                        "json",
                        "-show_format",
                        "-show_streams",
                    ])
                    .arg(path),
            )
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("FFprobe exited with {:?}", output.status.code()),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        Ok(output.stdout)
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let started = std::time::Instant::now();
        let result = FfmpegRunner::new().with_timeout(self.timeout).run(cmd).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::histogram!("vpost_ffmpeg_duration_seconds", "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());

        result
    }
}
