//! Job types for the queue.

use serde::{Deserialize, Serialize};
use vpost_models::{JobId, JobParams};

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Watermark, optional merge, outro and encode
    PostProcess(JobParams),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::PostProcess(p) => &p.job_id,
        }
    }

    pub fn params(&self) -> &JobParams {
        match self {
            QueueJob::PostProcess(p) => p,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::PostProcess(p) => p.idempotency_key(),
        }
    }
}

impl From<JobParams> for QueueJob {
    fn from(params: JobParams) -> Self {
        QueueJob::PostProcess(params)
    }
}
