//! Encoder capability detection.

use tracing::{info, warn};
use vpost_models::encoding::GPU_VIDEO_CODEC;
use vpost_models::EncoderCapability;

use crate::engine::MediaEngine;
use crate::error::MediaError;

/// Detect what the engine can encode with. Never fails.
///
/// An unreachable engine yields [`EncoderCapability::None`], which the
/// encode strategy treats like `CpuOnly`.
pub async fn probe(engine: &dyn MediaEngine) -> EncoderCapability {
    match engine.list_encoders().await {
        Ok(listing) => {
            let capability = from_encoder_listing(&listing);
            info!(capability = %capability, "Detected encoder capability");
            capability
        }
        Err(e) => {
            let err = MediaError::CapabilityUnavailable(e.to_string());
            warn!(error = %err, "Falling back to CPU encoding");
            EncoderCapability::None
        }
    }
}

/// Classify the text of `ffmpeg -encoders`.
pub fn from_encoder_listing(listing: &str) -> EncoderCapability {
    let has_nvenc = listing
        .lines()
        .any(|line| line.split_whitespace().any(|word| word == GPU_VIDEO_CODEC));

    if has_nvenc {
        EncoderCapability::GpuH264
    } else {
        EncoderCapability::CpuOnly
    }
}
