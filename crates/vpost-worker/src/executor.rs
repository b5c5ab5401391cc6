//! Job submission.
//!
//! A [`JobExecutor`] takes staged [`JobParams`] and returns the job's
//! status at hand-off: `Pending` for the queue, terminal for inline runs.
//! The [`Dispatcher`] queues a job when Redis answers and accepts it, and
//! runs it inline otherwise.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vpost_models::{ExecutionMode, JobParams, JobStatusSnapshot};
use vpost_queue::{JobQueue, JobStatusStore, QueueError, QueueJob};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::orchestrator::{LogReporter, Orchestrator};

/// Something that can accept a post-processing job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn submit(&self, params: JobParams) -> WorkerResult<JobStatusSnapshot>;
}

/// Hands jobs to the Redis queue for a worker to pick up.
#[derive(Clone)]
pub struct QueuedExecutor {
    queue: JobQueue,
    status: JobStatusStore,
}

impl QueuedExecutor {
    pub fn new(queue: JobQueue) -> Self {
        let status = JobStatusStore::for_queue(&queue);
        Self { queue, status }
    }
}

#[async_trait]
impl JobExecutor for QueuedExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Queued
    }

    async fn submit(&self, params: JobParams) -> WorkerResult<JobStatusSnapshot> {
        let snapshot = JobStatusSnapshot::pending(params.job_id.clone(), ExecutionMode::Queued);
        // Written first so a poll right after submission never sees an unknown job
        self.status.put(&snapshot).await?;

        let message_id = self.queue.enqueue(&QueueJob::from(params)).await?;
        metrics::record_submitted(ExecutionMode::Queued);

        info!(job_id = %snapshot.job_id, message_id = %message_id, "Job queued");
        Ok(snapshot)
    }
}

/// Runs the job in the calling task and returns its terminal status.
#[derive(Clone)]
pub struct InlineExecutor {
    orchestrator: Orchestrator,
}

impl InlineExecutor {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobExecutor for InlineExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Inline
    }

    async fn submit(&self, params: JobParams) -> WorkerResult<JobStatusSnapshot> {
        metrics::record_submitted(ExecutionMode::Inline);
        info!(job_id = %params.job_id, "Processing job inline");

        Ok(self
            .orchestrator
            .run(&params, ExecutionMode::Inline, &LogReporter)
            .await)
    }
}

/// Chooses queued execution when Redis answers, inline otherwise.
pub struct Dispatcher {
    queue: Option<JobQueue>,
    inline: InlineExecutor,
}

impl Dispatcher {
    /// `queue` is `None` when no client could be built; every job then runs inline.
    pub fn new(queue: Option<JobQueue>, orchestrator: Orchestrator) -> Self {
        Self {
            queue,
            inline: InlineExecutor::new(orchestrator),
        }
    }

    /// Executor a submission starts with, judged by a PING alone.
    pub async fn select(&self) -> Box<dyn JobExecutor> {
        if let Some(queue) = &self.queue {
            match queue.ping().await {
                Ok(()) => return Box::new(QueuedExecutor::new(queue.clone())),
                Err(e) => warn!(error = %e, "Redis unreachable, processing inline"),
            }
        }
        Box::new(self.inline.clone())
    }

    /// Queue the job, or run it inline when Redis is down or refuses the job.
    ///
    /// A duplicate submission is reported as an error rather than run twice.
    pub async fn submit(&self, params: JobParams) -> WorkerResult<JobStatusSnapshot> {
        let Some(queue) = &self.queue else {
            return self.inline.submit(params).await;
        };

        match queue.ping().await {
            Ok(()) => match QueuedExecutor::new(queue.clone()).submit(params.clone()).await {
                Err(WorkerError::Queue(e)) if !matches!(e, QueueError::DuplicateJob(_)) => {
                    warn!(job_id = %params.job_id, error = %e, "Queue rejected the job, processing inline");
                }
                queued => return queued,
            },
            Err(e) => warn!(error = %e, "Redis unreachable, processing inline"),
        }

        let snapshot = self.inline.submit(params).await?;
        record_inline_result(queue, &snapshot).await;
        Ok(snapshot)
    }
}

/// Store the terminal snapshot of an inline run if Redis is reachable now,
/// replacing any `Pending` left by a failed queue hand-off.
async fn record_inline_result(queue: &JobQueue, snapshot: &JobStatusSnapshot) {
    if let Err(e) = queue.ping().await {
        debug!(job_id = %snapshot.job_id, error = %e, "Inline result not stored, Redis unreachable");
        return;
    }
    if let Err(e) = JobStatusStore::for_queue(queue).put(snapshot).await {
        warn!(job_id = %snapshot.job_id, error = %e, "Failed to store inline job status");
    }
}
