//! Per-job pipeline: capability probe, optional merge, inspection, encode.
//!
//! Progress milestones:
//!
//! | progress | step                                         |
//! |----------|----------------------------------------------|
//! | 10       | probing encoder support                      |
//! | 20       | capability known                             |
//! | 30       | merging the second video (only when present) |
//! | 50       | inputs finalized                             |
//! | 60       | GPU encode (only with `h264_nvenc`)          |
//! | 70       | CPU encode (no GPU, or GPU failed)           |
//! | 100      | output written                               |
//!
//! A failure ends at progress 0 with a short `error_id` that also appears in
//! the error log line carrying the full cause chain and FFmpeg stderr.

use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;
use vpost_media::encode::EncodeInputs;
use vpost_media::{capability, inspect, plan, EncodeStrategy, MediaEngine, MediaError, Merger, TempArtifact};
use vpost_models::{EncoderTier, ExecutionMode, JobParams, JobStatusSnapshot};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::workspace;

/// Receives every status transition of a running job.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, snapshot: &JobStatusSnapshot);
}

/// Reporter that only logs; used when nobody polls.
pub struct LogReporter;

#[async_trait]
impl ProgressReporter for LogReporter {
    async fn report(&self, snapshot: &JobStatusSnapshot) {
        tracing::debug!(
            job_id = %snapshot.job_id,
            state = %snapshot.state,
            progress = snapshot.progress,
            "{}", snapshot.status_message
        );
    }
}

/// Runs one job from inputs to a terminal snapshot.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    engine: Arc<dyn MediaEngine>,
    merger: Merger,
    encoder: EncodeStrategy,
}

impl Orchestrator {
    pub fn new(config: Arc<PipelineConfig>, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            merger: Merger::new(Arc::clone(&engine)),
            encoder: EncodeStrategy::new(Arc::clone(&engine)),
            config,
            engine,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    /// Run the job to completion. The returned snapshot is always terminal.
    pub async fn run(
        &self,
        params: &JobParams,
        mode: ExecutionMode,
        reporter: &dyn ProgressReporter,
    ) -> JobStatusSnapshot {
        let logger = JobLogger::new(&params.job_id, mode);
        let span = logger.create_span();

        async move {
            logger.log_start(&params.primary_input.display().to_string());

            let mut tracker = Tracker {
                snapshot: JobStatusSnapshot::pending(params.job_id.clone(), mode),
                reporter,
                logger: &logger,
            };

            let result = self.process(params, &mut tracker).await;
            remove_temp_dir(params).await;

            let mut snapshot = tracker.snapshot;
            match result {
                Ok(tier) => {
                    snapshot.succeed(&params.output_path);
                    metrics::record_completed(tier);
                    logger.log_completion(&format!(
                        "{} encode wrote {}",
                        tier,
                        params.output_path.display()
                    ));
                    workspace::remove_workspace(params).await;
                }
                Err(e) => {
                    let error_id = new_error_id();
                    logger.log_error(&error_id, &error_chain(&e), stderr_of(&e));
                    snapshot.fail(failure_message(&e, &error_id), error_id);
                    metrics::record_failed();
                }
            }

            reporter.report(&snapshot).await;
            snapshot
        }
        .instrument(span)
        .await
    }

    async fn process(&self, params: &JobParams, tracker: &mut Tracker<'_>) -> WorkerResult<EncoderTier> {
        tracker.advance(10, "Checking encoder support").await;
        let capability = capability::probe(self.engine.as_ref()).await;
        tracker
            .advance(20, &format!("Encoder support: {}", capability))
            .await;

        // Dropping the artifact deletes the merged file on every exit path
        let mut merged: Option<TempArtifact> = None;
        if let Some(secondary) = &params.secondary_input {
            tracker.advance(30, "Merging videos").await;
            match self
                .merger
                .merge(&params.primary_input, secondary, capability, &params.temp_dir())
                .await
            {
                Ok(artifact) => merged = Some(artifact),
                Err(e) => tracker.logger.log_warning(&format!(
                    "{}; continuing with the first video only",
                    e
                )),
            }
        }

        let content: &Path = merged
            .as_ref()
            .map(TempArtifact::path)
            .unwrap_or(params.primary_input.as_path());
        tracker.advance(50, "Processing video").await;

        let primary = inspect(self.engine.as_ref(), content).await?;
        let outro = inspect(self.engine.as_ref(), &self.config.outro_path).await?;
        let plan = plan::build(&primary, &outro, &self.config.watermark_path);
        let inputs = EncodeInputs {
            primary: content,
            outro: &self.config.outro_path,
        };

        if let Some(parent) = params.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if capability.has_gpu() {
            tracker.advance(60, "Encoding on GPU").await;
            match self.encoder.encode_gpu(inputs, &plan, &params.output_path).await {
                Ok(()) => return Ok(EncoderTier::Gpu),
                Err(e) => tracker
                    .logger
                    .log_warning(&format!("{}; falling back to CPU", e)),
            }
        }

        tracker.advance(70, "Encoding on CPU").await;
        self.encoder
            .encode_cpu(inputs, &plan, &params.output_path)
            .await?;
        Ok(EncoderTier::Cpu)
    }
}

struct Tracker<'a> {
    snapshot: JobStatusSnapshot,
    reporter: &'a dyn ProgressReporter,
    logger: &'a JobLogger,
}

impl Tracker<'_> {
    async fn advance(&mut self, progress: u8, message: &str) {
        self.snapshot.set_progress(progress, message);
        self.logger.log_progress(progress, message);
        self.reporter.report(&self.snapshot).await;
    }
}

async fn remove_temp_dir(params: &JobParams) {
    let temp_dir = params.temp_dir();
    match tokio::fs::remove_dir_all(&temp_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %temp_dir.display(), error = %e, "Failed to remove temp dir"),
    }
}

/// Eight hex characters correlating a failure with its log line.
pub(crate) fn new_error_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn failure_message(error: &WorkerError, error_id: &str) -> String {
    let summary = match error {
        WorkerError::Media(MediaError::NotProbeable { .. }) => "Input video could not be read",
        WorkerError::Media(MediaError::EncodeError { .. }) => "Video encoding failed",
        _ => "Video processing failed",
    };
    format!("{} [ID: {}]", summary, error_id)
}

fn error_chain(error: &WorkerError) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

fn stderr_of(error: &WorkerError) -> Option<&str> {
    match error {
        WorkerError::Media(e) => e.stderr(),
        _ => None,
    }
}
