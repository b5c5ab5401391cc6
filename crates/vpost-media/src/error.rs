//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;
use vpost_models::EncoderTier;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Encoder listing unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Cannot inspect {}: {reason}", path.display())]
    NotProbeable { path: PathBuf, reason: String },

    #[error("Merge failed: {message}")]
    MergeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("{tier} encode failed: {message}")]
    EncodeError {
        tier: EncoderTier,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an inspection failure error.
    pub fn not_probeable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotProbeable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an invocation failure as a merge failure, keeping its stderr.
    pub fn merge_failed(source: MediaError) -> Self {
        let stderr = source.stderr().map(str::to_string);
        Self::MergeFailed {
            message: source.to_string(),
            stderr,
        }
    }

    /// Wrap an invocation failure as an encode failure for `tier`.
    pub fn encode_failed(tier: EncoderTier, source: MediaError) -> Self {
        let stderr = source.stderr().map(str::to_string);
        let exit_code = source.exit_code();
        Self::EncodeError {
            tier,
            message: source.to_string(),
            stderr,
            exit_code,
        }
    }

    /// Captured stderr, if the failing process produced any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::MergeFailed { stderr, .. }
            | Self::EncodeError { stderr, .. }
            | Self::FfmpegFailed { stderr, .. }
            | Self::FfprobeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Exit code of the failing process, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::EncodeError { exit_code, .. } | Self::FfmpegFailed { exit_code, .. } => {
                *exit_code
            }
            _ => None,
        }
    }
}
