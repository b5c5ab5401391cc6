//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with idempotency keys
//! - Worker consumption with crash recovery, retry counting and DLQ
//! - Status snapshots and revocation markers for polling

pub mod error;
pub mod job;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use job::QueueJob;
pub use queue::{Delivery, JobQueue, QueueConfig};
pub use status::JobStatusStore;
