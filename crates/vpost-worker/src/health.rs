//! Deployment health report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use vpost_media::check_ffmpeg;
use vpost_queue::JobQueue;

use crate::config::PipelineConfig;

/// Snapshot of everything a job depends on.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `healthy` when jobs can run at all, `degraded` otherwise
    pub status: &'static str,
    pub queue_reachable: bool,
    /// Consumers registered in the worker group, when Redis answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dlq_length: Option<u64>,
    pub ffmpeg_available: bool,
    pub assets: AssetStatus,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssetStatus {
    pub watermark: bool,
    pub outro: bool,
}

impl HealthReport {
    /// Jobs can run (inline at least): assets and ffmpeg are in place.
    pub fn is_healthy(&self) -> bool {
        self.ffmpeg_available && self.assets.watermark && self.assets.outro
    }
}

/// Gather the report. Queue details are omitted when Redis is unreachable.
pub async fn collect(config: &PipelineConfig, queue: Option<&JobQueue>) -> HealthReport {
    let mut report = HealthReport {
        status: "degraded",
        queue_reachable: false,
        workers: None,
        queue_length: None,
        dlq_length: None,
        ffmpeg_available: check_ffmpeg().is_ok(),
        assets: AssetStatus {
            watermark: config.watermark_path.is_file(),
            outro: config.outro_path.is_file(),
        },
        upload_dir: config.upload_dir.clone(),
        output_dir: config.output_dir.clone(),
        checked_at: Utc::now(),
    };

    if let Some(queue) = queue {
        match queue.ping().await {
            Ok(()) => {
                report.queue_reachable = true;
                report.workers = queue.consumer_count().await.ok();
                report.queue_length = queue.len().await.ok();
                report.dlq_length = queue.dlq_len().await.ok();
            }
            Err(e) => warn!(error = %e, "Health check: Redis unreachable"),
        }
    }

    if report.is_healthy() {
        report.status = "healthy";
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_without_queue() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = dir.path().join("watermark.png");
        std::fs::write(&watermark, b"png").unwrap();

        let config = PipelineConfig::default()
            .with_assets(&watermark, dir.path().join("missing.mp4"))
            .with_dirs(dir.path().join("up"), dir.path().join("out"));

        let report = collect(&config, None).await;

        assert!(!report.queue_reachable);
        assert!(report.workers.is_none());
        assert!(report.assets.watermark);
        assert!(!report.assets.outro);
        assert_eq!(report.status, "degraded");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["assets"]["outro"], false);
        assert!(json.get("workers").is_none());
    }
}
