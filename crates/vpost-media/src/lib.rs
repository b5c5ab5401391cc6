//! FFmpeg CLI wrapper for the vpost pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout and stderr capture
//! - The [`MediaEngine`] seam over `ffmpeg`/`ffprobe`
//! - Encoder capability probing and media inspection
//! - A typed filter graph and the watermark/outro [`FilterPlan`]
//! - GPU/CPU encode selection and two-video merging
//! - Scoped temporary artifacts

pub mod capability;
pub mod command;
pub mod encode;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod merge;
pub mod plan;
pub mod probe;
pub(crate) mod progress;
pub mod temp;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{EncodeInputs, EncodeStrategy};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use graph::{Filter, FilterChain, FilterGraph};
pub use merge::Merger;
pub use plan::{AudioPolicy, FilterPlan};
pub use probe::inspect;
pub use temp::TempArtifact;
