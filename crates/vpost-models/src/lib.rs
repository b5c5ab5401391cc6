//! Shared data models for the vpost pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers, parameters and lifecycle states
//! - Polled job status snapshots
//! - Encoder capability and per-tier encoder profiles
//! - Probed media descriptors

pub mod encoding;
pub mod job;
pub mod job_status;
pub mod media;

// Re-export common types
pub use encoding::{EncoderCapability, EncoderProfile, EncoderTier};
pub use job::{ExecutionMode, JobId, JobParams, JobState, TEMP_DIR_NAME};
pub use job_status::JobStatusSnapshot;
pub use media::{DescriptorError, MediaDescriptor};
