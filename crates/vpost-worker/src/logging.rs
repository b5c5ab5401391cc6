//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for job processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vpost_models::{ExecutionMode, JobId};

/// Initialize the global subscriber.
///
/// JSON lines when `LOG_FORMAT=json`, colored human-readable output otherwise.
/// `RUST_LOG` directives are honoured on top of `vpost=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vpost=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job ID and how the job was dispatched.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    mode: ExecutionMode,
}

impl JobLogger {
    pub fn new(job_id: &JobId, mode: ExecutionMode) -> Self {
        Self {
            job_id: job_id.to_string(),
            mode,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, progress: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            progress,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            mode = %self.mode,
            "Job warning: {}", message
        );
    }

    /// Log a failure together with its correlation ID and captured stderr.
    pub fn log_error(&self, error_id: &str, message: &str, stderr: Option<&str>) {
        error!(
            job_id = %self.job_id,
            mode = %self.mode,
            error_id,
            stderr = stderr.unwrap_or(""),
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            mode = %self.mode
        )
    }
}
