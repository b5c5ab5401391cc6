//! Encoder capability and per-tier encoding profiles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware H.264 encoder exposed by FFmpeg builds with NVENC support.
pub const GPU_VIDEO_CODEC: &str = "h264_nvenc";
/// Software H.264 encoder.
pub const CPU_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Sample rate of synthesized silence.
pub const SILENCE_SAMPLE_RATE: u32 = 48_000;
/// Channel layout of synthesized silence.
pub const SILENCE_CHANNEL_LAYOUT: &str = "stereo";

/// Opacity applied to the full-frame watermark.
pub const WATERMARK_OPACITY: f32 = 0.3;

/// What the local FFmpeg installation can encode with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncoderCapability {
    /// FFmpeg missing or not runnable
    #[default]
    None,
    /// FFmpeg runs but exposes no hardware H.264 encoder
    CpuOnly,
    /// `h264_nvenc` is available
    GpuH264,
}

impl EncoderCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderCapability::None => "none",
            EncoderCapability::CpuOnly => "cpu_only",
            EncoderCapability::GpuH264 => "gpu_h264",
        }
    }

    /// Whether the GPU tier should be attempted.
    pub fn has_gpu(&self) -> bool {
        matches!(self, EncoderCapability::GpuH264)
    }
}

impl fmt::Display for EncoderCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encode tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EncoderTier {
    Gpu,
    Cpu,
}

impl EncoderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderTier::Gpu => "gpu",
            EncoderTier::Cpu => "cpu",
        }
    }
}

impl fmt::Display for EncoderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video encoder settings for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncoderProfile {
    /// Which tier this profile belongs to
    pub tier: EncoderTier,
    /// Video codec (e.g., "libx264", "h264_nvenc")
    pub codec: String,
    /// Encoder preset ("p1" for NVENC, "ultrafast" for x264)
    pub preset: String,
    /// Constant quality: `-cq` on NVENC, `-crf` on x264
    pub quality: u8,
    /// Target video bitrate (`-b:v`)
    #[serde(default)]
    pub video_bitrate: Option<String>,
    /// Peak bitrate cap (`-maxrate`)
    #[serde(default)]
    pub max_bitrate: Option<String>,
    /// Rate-control buffer (`-bufsize`)
    #[serde(default)]
    pub buffer_size: Option<String>,
    /// Enable NVENC spatial and temporal adaptive quantization
    #[serde(default)]
    pub adaptive_quantization: bool,
    /// NVENC rate-control lookahead frames
    #[serde(default)]
    pub rc_lookahead: Option<u32>,
    /// Encoder threads; 0 lets x264 use every core
    #[serde(default)]
    pub threads: Option<u32>,
}

impl EncoderProfile {
    /// Hardware profile for the main watermark/outro pass.
    pub fn gpu() -> Self {
        Self {
            tier: EncoderTier::Gpu,
            codec: GPU_VIDEO_CODEC.to_string(),
            preset: "p1".to_string(),
            quality: 23,
            video_bitrate: None,
            max_bitrate: Some("12M".to_string()),
            buffer_size: Some("24M".to_string()),
            adaptive_quantization: true,
            rc_lookahead: Some(20),
            threads: None,
        }
    }

    /// Software profile for the main pass.
    pub fn cpu() -> Self {
        Self {
            tier: EncoderTier::Cpu,
            codec: CPU_VIDEO_CODEC.to_string(),
            preset: "ultrafast".to_string(),
            quality: 26,
            video_bitrate: None,
            max_bitrate: None,
            buffer_size: None,
            adaptive_quantization: false,
            rc_lookahead: None,
            threads: Some(0),
        }
    }

    /// Hardware profile used when merging two uploads.
    pub fn gpu_merge() -> Self {
        Self {
            video_bitrate: Some("8M".to_string()),
            max_bitrate: None,
            buffer_size: None,
            adaptive_quantization: false,
            rc_lookahead: None,
            ..Self::gpu()
        }
    }

    /// Software profile used when merging two uploads.
    pub fn cpu_merge() -> Self {
        Self::cpu()
    }

    /// Profile for a tier's main pass.
    pub fn for_tier(tier: EncoderTier) -> Self {
        match tier {
            EncoderTier::Gpu => Self::gpu(),
            EncoderTier::Cpu => Self::cpu(),
        }
    }

    /// Convert to FFmpeg video encoder arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        // CRF is not used with NVENC, use -cq instead
        match self.tier {
            EncoderTier::Gpu => args.extend(["-cq".to_string(), self.quality.to_string()]),
            EncoderTier::Cpu => args.extend(["-crf".to_string(), self.quality.to_string()]),
        }

        if let Some(ref bitrate) = self.video_bitrate {
            args.extend(["-b:v".to_string(), bitrate.clone()]);
        }
        if let Some(ref maxrate) = self.max_bitrate {
            args.extend(["-maxrate".to_string(), maxrate.clone()]);
        }
        if let Some(ref bufsize) = self.buffer_size {
            args.extend(["-bufsize".to_string(), bufsize.clone()]);
        }
        if self.adaptive_quantization {
            args.extend([
                "-spatial-aq".to_string(),
                "1".to_string(),
                "-temporal-aq".to_string(),
                "1".to_string(),
            ]);
        }
        if let Some(lookahead) = self.rc_lookahead {
            args.extend(["-rc-lookahead".to_string(), lookahead.to_string()]);
        }
        if let Some(threads) = self.threads {
            args.extend(["-threads".to_string(), threads.to_string()]);
        }

        args
    }
}
