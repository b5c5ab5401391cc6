//! Queue consumer.
//!
//! Reads deliveries from the Redis stream, runs each through the
//! [`Orchestrator`] under a concurrency limit and writes status snapshots
//! at every milestone. A job that reaches a terminal state is acknowledged
//! whatever the outcome; only infrastructure errors count towards retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vpost_models::{ExecutionMode, JobStatusSnapshot};
use vpost_queue::{Delivery, JobQueue, JobStatusStore, QueueJob};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::orchestrator::{new_error_id, Orchestrator, ProgressReporter};
use crate::retry::{retry_async, FailureTracker, RetryConfig};
use crate::workspace;

/// Writes each snapshot to the status store.
pub struct StoreReporter {
    status: JobStatusStore,
}

impl StoreReporter {
    pub fn new(status: JobStatusStore) -> Self {
        Self { status }
    }
}

#[async_trait]
impl ProgressReporter for StoreReporter {
    async fn report(&self, snapshot: &JobStatusSnapshot) {
        // A missed update only delays what pollers see
        if let Err(e) = self.status.put(snapshot).await {
            warn!(job_id = %snapshot.job_id, error = %e, "Failed to store job status");
        }
    }
}

#[derive(Clone)]
struct JobContext {
    queue: Arc<JobQueue>,
    status: JobStatusStore,
    orchestrator: Orchestrator,
    consumer_name: String,
    heartbeat_interval: Duration,
}

/// Worker loop over the job stream.
pub struct QueueConsumer {
    config: Arc<PipelineConfig>,
    ctx: JobContext,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl QueueConsumer {
    pub fn new(config: Arc<PipelineConfig>, queue: JobQueue, orchestrator: Orchestrator) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        let status = JobStatusStore::for_queue(&queue);

        Self {
            config: config.clone(),
            ctx: JobContext {
                queue: Arc::new(queue),
                status,
                orchestrator,
                consumer_name: consumer_name.clone(),
                heartbeat_interval: config.job_heartbeat_interval,
            },
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Consume until [`shutdown`](Self::shutdown) is called, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting consumer '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.ctx.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();
        let mut failures = FailureTracker::new(3);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    match result {
                        Ok(()) => failures.record_success(),
                        Err(e) => {
                            if failures.record_failure() {
                                error!("Error consuming jobs: {}", e);
                            }
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}; they will be reclaimed by another worker",
                self.config.shutdown_timeout
            );
        }

        info!("Queue consumer stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let ctx = self.ctx.clone();
        let consumer_name = self.consumer_name.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let claim_interval = self.config.claim_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let available = semaphore.available_permits();
                        if available == 0 {
                            continue;
                        }
                        match ctx.queue.claim_pending(&consumer_name, available.min(5)).await {
                            Ok(deliveries) => {
                                for delivery in deliveries {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let ctx = ctx.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::handle_delivery(ctx, delivery).await;
                                    });
                                }
                            }
                            Err(e) => warn!("Failed to claim pending jobs: {}", e),
                        }
                    }
                }
            }
        })
    }

    /// Consume and dispatch up to the number of free job slots.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .ctx
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }
        debug!("Consumed {} deliveries from queue", deliveries.len());

        for delivery in deliveries {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let ctx = self.ctx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::handle_delivery(ctx, delivery).await;
            });
        }

        Ok(())
    }

    async fn handle_delivery(ctx: JobContext, delivery: Delivery) {
        match delivery {
            Delivery::Job { message_id, job } => Self::execute_job(ctx, message_id, job).await,
            Delivery::Malformed {
                message_id,
                payload,
                reason,
            } => {
                warn!(message_id = %message_id, reason = %reason, "Dead-lettering malformed delivery");
                match ctx.queue.dlq_raw(&message_id, &payload, &reason).await {
                    Ok(()) => metrics::record_dead_lettered(),
                    Err(e) => error!(message_id = %message_id, "Failed to dead-letter malformed delivery: {}", e),
                }
            }
        }
    }

    /// Refresh the claim on `message_id` until the returned task is aborted.
    fn spawn_heartbeat(ctx: &JobContext, message_id: &str) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&ctx.queue);
        let consumer_name = ctx.consumer_name.clone();
        let message_id = message_id.to_string();
        let period = ctx.heartbeat_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut failures = FailureTracker::new(3);
            // First tick fires immediately; the delivery was just read
            interval.tick().await;
            loop {
                interval.tick().await;
                match queue.heartbeat(&consumer_name, &message_id).await {
                    Ok(()) => failures.record_success(),
                    Err(e) => {
                        if failures.record_failure() {
                            warn!(message_id = %message_id, "Job heartbeat failed: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Execute a single job with retry and DLQ handling.
    async fn execute_job(ctx: JobContext, message_id: String, job: QueueJob) {
        let job_id = job.job_id().clone();

        let heartbeat = Self::spawn_heartbeat(&ctx, &message_id);
        let outcome = Self::process_job(&ctx, &job).await;
        heartbeat.abort();

        match outcome {
            Ok(snapshot) => {
                info!(job_id = %job_id, state = %snapshot.state, "Job finished");
                let ack = RetryConfig::new("ack");
                if let Err((e, attempts)) = retry_async(&ack, || ctx.queue.ack(&message_id)).await {
                    error!(
                        job_id = %job_id,
                        attempts,
                        "Failed to ack job: {}", e
                    );
                }
            }
            Err(e) => {
                error!(job_id = %job_id, "Job could not be processed: {}", e);

                let retry_count = match ctx.queue.increment_retry(&message_id).await {
                    Ok(count) => count,
                    Err(retry_err) => {
                        warn!(job_id = %job_id, "Failed to record retry: {}", retry_err);
                        u32::MAX
                    }
                };
                let max_retries = ctx.queue.max_retries();

                if retry_count >= max_retries {
                    warn!(
                        job_id = %job_id,
                        "Job exceeded max retries ({}), moving to DLQ", max_retries
                    );
                    if let Err(dlq_err) = ctx.queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!(job_id = %job_id, "Failed to move job to DLQ: {}", dlq_err);
                    }
                    metrics::record_dead_lettered();

                    let mut snapshot = JobStatusSnapshot::pending(job_id.clone(), ExecutionMode::Queued);
                    snapshot.fail(
                        format!("Job failed after {} attempts", max_retries),
                        new_error_id(),
                    );
                    StoreReporter::new(ctx.status.clone()).report(&snapshot).await;
                } else {
                    info!(
                        job_id = %job_id,
                        "Job will be retried (attempt {}/{})", retry_count, max_retries
                    );
                }
            }
        }
    }

    /// Run a job unless it was revoked or already finished.
    async fn process_job(ctx: &JobContext, job: &QueueJob) -> WorkerResult<JobStatusSnapshot> {
        let params = job.params();

        if let Some(existing) = ctx.status.get(&params.job_id).await? {
            if existing.is_terminal() {
                debug!(job_id = %params.job_id, "Job already finished, skipping redelivery");
                return Ok(existing);
            }
        }

        if ctx.status.is_revoked(&params.job_id).await? {
            info!(job_id = %params.job_id, "Job revoked before start");
            let mut snapshot = JobStatusSnapshot::pending(params.job_id.clone(), ExecutionMode::Queued);
            snapshot.revoked = true;
            snapshot.fail("Job revoked before start", new_error_id());
            ctx.status.put(&snapshot).await?;
            workspace::remove_workspace(params).await;
            metrics::record_revoked();
            return Ok(snapshot);
        }

        let reporter = StoreReporter::new(ctx.status.clone());
        Ok(ctx
            .orchestrator
            .run(params, ExecutionMode::Queued, &reporter)
            .await)
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
