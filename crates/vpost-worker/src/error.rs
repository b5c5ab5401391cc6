//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Required asset missing: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Media error: {0}")]
    Media(#[from] vpost_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vpost_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn queue_unavailable(msg: impl Into<String>) -> Self {
        Self::QueueUnavailable(msg.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Check if error is retryable.
    ///
    /// Only infrastructure errors qualify. A job that reached a terminal
    /// Failure is never redelivered.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Queue(_) | WorkerError::QueueUnavailable(_) | WorkerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::queue_unavailable("down").is_retryable());
        assert!(WorkerError::Io(std::io::Error::other("disk")).is_retryable());
        assert!(!WorkerError::AssetMissing(PathBuf::from("assets/outro.mp4")).is_retryable());
        assert!(!WorkerError::job_failed("encode").is_retryable());
    }

    #[test]
    fn test_asset_missing_message() {
        let err = WorkerError::AssetMissing(PathBuf::from("assets/watermark.png"));
        assert_eq!(err.to_string(), "Required asset missing: assets/watermark.png");
    }
}
