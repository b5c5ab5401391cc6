//! Job definitions for queue and inline processing.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Name of the intermediates folder inside a job workspace.
pub const TEMP_DIR_NAME: &str = "tmp";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a post-processing job.
///
/// `Pending -> Processing -> {Success, Failure}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted, not yet picked up
    #[default]
    Pending,
    /// Being processed by the orchestrator
    Processing,
    /// Output file written
    Success,
    /// Both encode tiers failed or an input could not be inspected
    Failure,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Success => "success",
            JobState::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a job was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Submitted to the Redis queue and run by a worker
    #[default]
    Queued,
    /// Run synchronously in the submitting process
    Inline,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Queued => "queued",
            ExecutionMode::Inline => "inline",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of one post-processing job.
///
/// Everything the orchestrator needs; the watermark and outro assets come
/// from process-wide configuration, not from the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobParams {
    /// Unique job ID
    pub job_id: JobId,
    /// First (or only) uploaded video
    pub primary_input: PathBuf,
    /// Optional second video, concatenated after the primary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_input: Option<PathBuf>,
    /// Final MP4 location
    pub output_path: PathBuf,
    /// Per-job workspace holding the staged uploads and temp files
    pub workspace_dir: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl JobParams {
    /// Create parameters for a fresh job.
    pub fn new(
        job_id: JobId,
        primary_input: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        workspace_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id,
            primary_input: primary_input.into(),
            secondary_input: None,
            output_path: output_path.into(),
            workspace_dir: workspace_dir.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the second video.
    pub fn with_secondary(mut self, path: impl Into<PathBuf>) -> Self {
        self.secondary_input = Some(path.into());
        self
    }

    /// Directory for intermediate files owned by this job.
    pub fn temp_dir(&self) -> PathBuf {
        self.workspace_dir.join(TEMP_DIR_NAME)
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("postprocess:{}", self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_params_creation() {
        let id = JobId::from_string("abc");
        let params = JobParams::new(id, "/up/abc/a.mp4", "/out/output_abc.mp4", "/up/abc")
            .with_secondary("/up/abc/b.mp4");

        assert_eq!(params.secondary_input, Some(PathBuf::from("/up/abc/b.mp4")));
        assert_eq!(params.temp_dir(), PathBuf::from("/up/abc/tmp"));
        assert_eq!(params.idempotency_key(), "postprocess:abc");
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Success.is_terminal());
        assert!(JobState::Failure.is_terminal());
    }

    #[test]
    fn test_job_params_serde_skips_missing_secondary() {
        let params = JobParams::new(JobId::new(), "a.mp4", "out.mp4", "ws");
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("secondary_input"));

        let back: JobParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
