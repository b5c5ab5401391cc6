//! Pipeline configuration.
//!
//! Built once at startup and shared behind an `Arc`; nothing below the
//! binaries reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;
use vpost_queue::QueueConfig;

use crate::error::{WorkerError, WorkerResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// PNG overlaid on every frame
    pub watermark_path: PathBuf,
    /// Clip appended after the content
    pub outro_path: PathBuf,
    /// Root of the per-job workspaces
    pub upload_dir: PathBuf,
    /// Where finished outputs are written
    pub output_dir: PathBuf,
    /// Limit for a single ffmpeg/ffprobe invocation
    pub ffmpeg_timeout: Duration,
    /// Maximum concurrent jobs per worker
    pub max_concurrent_jobs: usize,
    /// How often the worker scans for orphaned pending entries
    pub claim_interval: Duration,
    /// How often a running job refreshes its claim on the stream entry
    pub job_heartbeat_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Prometheus listener address, exporter disabled when unset
    pub metrics_addr: Option<String>,
    /// Redis queue settings
    pub queue: QueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watermark_path: PathBuf::from("assets/watermark.png"),
            outro_path: PathBuf::from("assets/outro.mp4"),
            upload_dir: PathBuf::from("/data/uploads"),
            output_dir: PathBuf::from("/data/outputs"),
            ffmpeg_timeout: Duration::from_secs(3600), // 1 hour
            max_concurrent_jobs: 2,
            claim_interval: Duration::from_secs(30),
            job_heartbeat_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            metrics_addr: None,
            queue: QueueConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            watermark_path: env_path("WATERMARK_PATH").unwrap_or(defaults.watermark_path),
            outro_path: env_path("OUTRO_PATH").unwrap_or(defaults.outro_path),
            upload_dir: env_path("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            job_heartbeat_interval: Duration::from_secs(
                std::env::var("WORKER_JOB_HEARTBEAT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n: &u64| *n > 0)
                    .unwrap_or(60),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            metrics_addr: std::env::var("METRICS_ADDR").ok().filter(|s| !s.is_empty()),
            queue: QueueConfig::from_env(),
        }
    }

    pub fn with_assets(mut self, watermark: impl Into<PathBuf>, outro: impl Into<PathBuf>) -> Self {
        self.watermark_path = watermark.into();
        self.outro_path = outro.into();
        self
    }

    pub fn with_dirs(mut self, upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = upload_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Check the fixed assets and create the working folders.
    ///
    /// A missing watermark or outro is fatal: no job can succeed without them.
    pub fn validate(&self) -> WorkerResult<()> {
        for asset in [&self.watermark_path, &self.outro_path] {
            if !asset.is_file() {
                return Err(WorkerError::AssetMissing(asset.clone()));
            }
        }
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be at least 1"));
        }
        if self.job_heartbeat_interval.is_zero()
            || self.job_heartbeat_interval >= self.queue.visibility_timeout
        {
            return Err(WorkerError::config_error(
                "WORKER_JOB_HEARTBEAT_SECS must be positive and shorter than QUEUE_VISIBILITY_TIMEOUT",
            ));
        }

        ensure_dir(&self.upload_dir)?;
        ensure_dir(&self.output_dir)?;

        info!(
            watermark = %self.watermark_path.display(),
            outro = %self.outro_path.display(),
            upload_dir = %self.upload_dir.display(),
            output_dir = %self.output_dir.display(),
            "Pipeline configuration validated"
        );
        Ok(())
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn ensure_dir(path: &Path) -> WorkerResult<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        WorkerError::config_error(format!("cannot create {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.watermark_path, PathBuf::from("assets/watermark.png"));
        assert_eq!(config.outro_path, PathBuf::from("assets/outro.mp4"));
        assert_eq!(config.ffmpeg_timeout, Duration::from_secs(3600));
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_validate_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = dir.path().join("watermark.png");
        std::fs::write(&watermark, b"png").unwrap();

        let config = PipelineConfig::default()
            .with_assets(&watermark, dir.path().join("outro.mp4"))
            .with_dirs(dir.path().join("up"), dir.path().join("out"));

        match config.validate() {
            Err(WorkerError::AssetMissing(path)) => assert!(path.ends_with("outro.mp4")),
            other => panic!("expected AssetMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_slow_heartbeat() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = dir.path().join("watermark.png");
        let outro = dir.path().join("outro.mp4");
        std::fs::write(&watermark, b"png").unwrap();
        std::fs::write(&outro, b"mp4").unwrap();

        let mut config = PipelineConfig::default()
            .with_assets(&watermark, &outro)
            .with_dirs(dir.path().join("up"), dir.path().join("out"));
        config.job_heartbeat_interval = config.queue.visibility_timeout;

        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_validate_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = dir.path().join("watermark.png");
        let outro = dir.path().join("outro.mp4");
        std::fs::write(&watermark, b"png").unwrap();
        std::fs::write(&outro, b"mp4").unwrap();

        let config = PipelineConfig::default()
            .with_assets(&watermark, &outro)
            .with_dirs(dir.path().join("up"), dir.path().join("out"));

        config.validate().unwrap();
        assert!(dir.path().join("up").is_dir());
        assert!(dir.path().join("out").is_dir());
    }
}
