//! Job status snapshots for progress tracking and polling.
//!
//! A snapshot is what `poll(job_id)` returns. The queued path stores it in
//! Redis; the inline path builds it in memory and hands it straight back.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{ExecutionMode, JobId, JobState};

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusSnapshot {
    /// Unique job identifier
    pub job_id: JobId,
    /// Current lifecycle state
    pub state: JobState,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable status line
    pub status_message: String,
    /// Final output file, set on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Short identifier correlating a failure with detailed logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    /// How the job was dispatched
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Set when a revocation was requested
    #[serde(default)]
    pub revoked: bool,
    /// When the status was last updated
    pub updated_at: DateTime<Utc>,
}

impl JobStatusSnapshot {
    /// Create a pending snapshot.
    pub fn pending(job_id: JobId, mode: ExecutionMode) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            progress: 0,
            status_message: "Waiting to start".to_string(),
            output_path: None,
            error_id: None,
            mode,
            revoked: false,
            updated_at: Utc::now(),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record a processing milestone.
    pub fn set_progress(&mut self, progress: u8, message: impl Into<String>) {
        self.state = JobState::Processing;
        self.progress = progress.min(100);
        self.status_message = message.into();
        self.updated_at = Utc::now();
    }

    /// Mark job as successful.
    pub fn succeed(&mut self, output_path: impl Into<PathBuf>) {
        self.state = JobState::Success;
        self.progress = 100;
        self.status_message = "Processing completed".to_string();
        self.output_path = Some(output_path.into());
        self.updated_at = Utc::now();
    }

    /// Mark job as failed. Progress drops back to zero.
    pub fn fail(&mut self, message: impl Into<String>, error_id: impl Into<String>) {
        self.state = JobState::Failure;
        self.progress = 0;
        self.status_message = message.into();
        self.error_id = Some(error_id.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let snap = JobStatusSnapshot::pending(JobId::from_string("job-1"), ExecutionMode::Queued);
        assert_eq!(snap.state, JobState::Pending);
        assert_eq!(snap.progress, 0);
        assert!(!snap.is_terminal());
    }

    #[test]
    fn test_snapshot_transitions() {
        let mut snap = JobStatusSnapshot::pending(JobId::from_string("job-1"), ExecutionMode::Inline);

        snap.set_progress(60, "Encoding on GPU");
        assert_eq!(snap.state, JobState::Processing);
        assert_eq!(snap.progress, 60);

        snap.succeed("/out/output_job-1.mp4");
        assert_eq!(snap.state, JobState::Success);
        assert_eq!(snap.progress, 100);
        assert!(snap.is_terminal());
        assert_eq!(snap.output_path, Some(PathBuf::from("/out/output_job-1.mp4")));
    }

    #[test]
    fn test_snapshot_failure_resets_progress() {
        let mut snap = JobStatusSnapshot::pending(JobId::from_string("job-1"), ExecutionMode::Queued);
        snap.set_progress(70, "Encoding on CPU");
        snap.fail("Video processing failed", "a1b2c3d4");

        assert_eq!(snap.state, JobState::Failure);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.error_id.as_deref(), Some("a1b2c3d4"));
    }

    #[test]
    fn test_progress_clamped() {
        let mut snap = JobStatusSnapshot::pending(JobId::new(), ExecutionMode::Queued);
        snap.set_progress(150, "overflow");
        assert_eq!(snap.progress, 100);
    }
}
