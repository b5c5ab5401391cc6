//! In-memory [`MediaEngine`] for tests.
//!
//! Media files are registered with their properties; `run` records each
//! command, fails the way FFmpeg would (unknown input, missing audio stream
//! referenced by the graph, a codec marked as broken or timed out) and otherwise
//! writes a small file at the command's output path. Files produced by a
//! successful run become probeable themselves, taking the first input's
//! dimensions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::command::FfmpegCommand;
use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};

const NVENC_LISTING: &str =
    " V....D libx264              libx264 H.264\n V....D h264_nvenc           NVIDIA NVENC H.264 encoder\n";
const CPU_LISTING: &str = " V....D libx264              libx264 H.264\n A....D aac                  AAC\n";

#[derive(Debug, Clone, Copy)]
struct FakeMedia {
    width: u32,
    height: u32,
    duration: f64,
    has_audio: bool,
}

/// Recording fake engine.
#[derive(Debug, Default)]
pub struct FakeEngine {
    encoders: Option<String>,
    media: HashMap<PathBuf, FakeMedia>,
    broken_codecs: HashSet<String>,
    stalled_codecs: HashSet<String>,
    run_delay: Option<Duration>,
    calls: Mutex<Vec<FfmpegCommand>>,
    produced: Mutex<HashMap<PathBuf, FakeMedia>>,
}

impl FakeEngine {
    /// Engine whose encoder listing cannot be obtained.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn gpu() -> Self {
        Self {
            encoders: Some(NVENC_LISTING.to_string()),
            ..Self::default()
        }
    }

    pub fn cpu_only() -> Self {
        Self {
            encoders: Some(CPU_LISTING.to_string()),
            ..Self::default()
        }
    }

    /// Register a probeable file. The file itself is not created.
    pub fn with_media(mut self, path: impl Into<PathBuf>, width: u32, height: u32, has_audio: bool) -> Self {
        self.media.insert(
            path.into(),
            FakeMedia {
                width,
                height,
                duration: 10.0,
                has_audio,
            },
        );
        self
    }

    /// Override the container duration reported for a registered file.
    pub fn with_duration(mut self, path: impl AsRef<Path>, seconds: f64) -> Self {
        if let Some(media) = self.media.get_mut(path.as_ref()) {
            media.duration = seconds;
        }
        self
    }

    /// Make every run using `codec` exit non-zero.
    pub fn with_broken_codec(mut self, codec: &str) -> Self {
        self.broken_codecs.insert(codec.to_string());
        self
    }

    /// Make every run using `codec` fail the way a killed, timed-out FFmpeg does.
    pub fn with_timed_out_codec(mut self, codec: &str) -> Self {
        self.stalled_codecs.insert(codec.to_string());
        self
    }

    /// Sleep this long inside every `run`.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Commands passed to `run`, in order.
    pub fn calls(&self) -> Vec<FfmpegCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Video codec of each `run`, in order.
    pub fn codecs_run(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|cmd| arg_after(&cmd.build_args(), "-c:v"))
            .collect()
    }
}

impl FakeEngine {
    fn lookup(&self, path: &Path) -> Option<FakeMedia> {
        if let Some(media) = self.media.get(path) {
            return Some(*media);
        }
        self.produced.lock().ok().and_then(|p| p.get(path).copied())
    }
}

fn arg_after(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn list_encoders(&self) -> MediaResult<String> {
        self.encoders.clone().ok_or(MediaError::FfmpegNotFound)
    }

    async fn probe_json(&self, path: &Path) -> MediaResult<Vec<u8>> {
        let media = self.lookup(path).ok_or_else(|| MediaError::FfprobeFailed {
            message: "Invalid data found when processing input".to_string(),
            stderr: None,
        })?;

        let mut streams = vec![serde_json::json!({
            "codec_type": "video",
            "width": media.width,
            "height": media.height,
        })];
        if media.has_audio {
            streams.push(serde_json::json!({ "codec_type": "audio" }));
        }

        Ok(serde_json::to_vec(&serde_json::json!({
            "streams": streams,
            "format": { "duration": media.duration.to_string() },
        }))?)
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }

        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }

        let args = cmd.build_args();
        let graph = arg_after(&args, "-filter_complex").unwrap_or_default();

        // FFmpeg may leave a truncated file behind on failure
        std::fs::write(cmd.output(), b"partial")?;

        let mut first: Option<FakeMedia> = None;
        for (index, input) in cmd.inputs().iter().enumerate() {
            let Some(media) = self.lookup(&input.path) else {
                return Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some(format!("{}: No such file or directory", input.path.display())),
                    Some(1),
                ));
            };
            if !media.has_audio && graph.contains(&format!("[{}:a]", index)) {
                return Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some(format!(
                        "Stream specifier ':a' in filtergraph description matches no streams ({})",
                        index
                    )),
                    Some(1),
                ));
            }
            first.get_or_insert(media);
        }

        if let Some(codec) = arg_after(&args, "-c:v") {
            if self.stalled_codecs.contains(&codec) {
                return Err(MediaError::Timeout(3600));
            }
            if self.broken_codecs.contains(&codec) {
                return Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some(format!("[{} @ 0x0] No capable devices found", codec)),
                    Some(1),
                ));
            }
        }

        std::fs::write(cmd.output(), b"encoded")?;
        if let (Some(media), Ok(mut produced)) = (first, self.produced.lock()) {
            produced.insert(
                cmd.output().to_path_buf(),
                FakeMedia {
                    has_audio: graph.contains("[outa]"),
                    ..media
                },
            );
        }
        Ok(())
    }
}
