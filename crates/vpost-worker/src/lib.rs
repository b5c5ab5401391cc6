//! Video post-processing worker.
//!
//! This crate provides:
//! - The per-job orchestrator (capability probe, merge, watermark/outro encode)
//! - Queued and inline job executors behind a Redis-pinging dispatcher
//! - The Redis stream consumer with crash recovery and dead-lettering
//! - Workspace staging, health reporting and the `vpost` command line

pub mod cli;
pub mod config;
pub mod consumer;
pub mod error;
pub mod executor;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod workspace;

pub use config::PipelineConfig;
pub use consumer::{QueueConsumer, StoreReporter};
pub use error::{WorkerError, WorkerResult};
pub use executor::{Dispatcher, InlineExecutor, JobExecutor, QueuedExecutor};
pub use health::HealthReport;
pub use logging::JobLogger;
pub use orchestrator::{LogReporter, Orchestrator, ProgressReporter};
