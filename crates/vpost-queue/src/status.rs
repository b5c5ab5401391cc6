//! Job status snapshots stored in Redis.
//!
//! Keys:
//! - `vpost:status:<job_id>`: JSON [`JobStatusSnapshot`], expires after the status TTL
//! - `vpost:revoked:<job_id>`: revocation marker checked before a queued job starts

use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};
use vpost_models::{ExecutionMode, JobId, JobStatusSnapshot};

use crate::error::QueueResult;
use crate::queue::JobQueue;

/// Redis key of a job's status snapshot.
pub fn status_key(job_id: &JobId) -> String {
    format!("vpost:status:{}", job_id)
}

/// Redis key of a job's revocation marker.
pub fn revoked_key(job_id: &JobId) -> String {
    format!("vpost:revoked:{}", job_id)
}

/// Reads and writes status snapshots.
#[derive(Clone)]
pub struct JobStatusStore {
    client: redis::Client,
    ttl: Duration,
}

impl JobStatusStore {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    /// Store sharing the queue's connection settings.
    pub fn for_queue(queue: &JobQueue) -> Self {
        Self::new(queue.client().clone(), queue.config().status_ttl)
    }

    /// Write a snapshot, refreshing its TTL.
    pub async fn put(&self, snapshot: &JobStatusSnapshot) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(snapshot)?;

        conn.set_ex::<_, _, ()>(status_key(&snapshot.job_id), payload, self.ttl.as_secs())
            .await?;

        debug!(
            job_id = %snapshot.job_id,
            state = %snapshot.state,
            progress = snapshot.progress,
            "Stored job status"
        );
        Ok(())
    }

    /// Stored snapshot, if any.
    pub async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobStatusSnapshot>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(status_key(job_id)).await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Current status; unknown jobs read as pending.
    pub async fn poll(&self, job_id: &JobId) -> QueueResult<JobStatusSnapshot> {
        let mut snapshot = self
            .get(job_id)
            .await?
            .unwrap_or_else(|| JobStatusSnapshot::pending(job_id.clone(), ExecutionMode::Queued));

        if !snapshot.revoked && self.is_revoked(job_id).await? {
            snapshot.revoked = true;
        }
        Ok(snapshot)
    }

    /// Mark a job as revoked. Best-effort: a job already running is not stopped.
    pub async fn revoke(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(revoked_key(job_id), "1", self.ttl.as_secs())
            .await?;

        if let Some(mut snapshot) = self.get(job_id).await? {
            snapshot.revoked = true;
            self.put(&snapshot).await?;
        }

        info!(job_id = %job_id, "Job revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(revoked_key(job_id)).await?;
        Ok(exists)
    }
}
