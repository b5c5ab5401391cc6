//! Probed properties of a media file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a probe result cannot describe an accepted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("no video stream")]
    NoVideoStream,

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Read-only description of an input video, derived from ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaDescriptor {
    /// Width in pixels of the first video stream
    pub width: u32,
    /// Height in pixels of the first video stream
    pub height: u32,
    /// Container duration; 0.0 when unknown
    pub duration_seconds: f64,
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
}

impl MediaDescriptor {
    /// Build a descriptor, rejecting inputs without a usable video stream.
    pub fn new(
        width: u32,
        height: u32,
        duration_seconds: f64,
        has_video_stream: bool,
        has_audio_stream: bool,
    ) -> Result<Self, DescriptorError> {
        if !has_video_stream {
            return Err(DescriptorError::NoVideoStream);
        }
        if width == 0 || height == 0 {
            return Err(DescriptorError::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            duration_seconds: if duration_seconds.is_finite() && duration_seconds > 0.0 {
                duration_seconds
            } else {
                0.0
            },
            has_video_stream,
            has_audio_stream,
        })
    }

    /// Frame size as `WxH`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_valid() {
        let d = MediaDescriptor::new(1920, 1080, 12.5, true, true).unwrap();
        assert_eq!(d.resolution(), "1920x1080");
        assert!(d.has_audio_stream);
    }

    #[test]
    fn test_descriptor_requires_video() {
        assert_eq!(
            MediaDescriptor::new(1920, 1080, 1.0, false, true),
            Err(DescriptorError::NoVideoStream)
        );
    }

    #[test]
    fn test_descriptor_rejects_zero_dimensions() {
        assert!(matches!(
            MediaDescriptor::new(0, 720, 1.0, true, false),
            Err(DescriptorError::InvalidDimensions { width: 0, height: 720 })
        ));
    }

    #[test]
    fn test_negative_duration_clamped() {
        let d = MediaDescriptor::new(640, 480, -3.0, true, false).unwrap();
        assert_eq!(d.duration_seconds, 0.0);
    }
}
