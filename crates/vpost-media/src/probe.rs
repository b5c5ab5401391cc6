//! FFprobe media inspection.

use serde::Deserialize;
use std::path::Path;
use tracing::debug;
use vpost_models::MediaDescriptor;

use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Inspect a media file.
///
/// Every failure (process error, malformed JSON, no video stream,
/// non-positive dimensions) is reported as [`MediaError::NotProbeable`].
pub async fn inspect(engine: &dyn MediaEngine, path: &Path) -> MediaResult<MediaDescriptor> {
    if !path.exists() {
        return Err(MediaError::not_probeable(path, "file not found"));
    }

    let json = engine
        .probe_json(path)
        .await
        .map_err(|e| MediaError::not_probeable(path, e.to_string()))?;

    let descriptor = parse_probe_output(path, &json)?;
    debug!(
        path = %path.display(),
        resolution = %descriptor.resolution(),
        duration = descriptor.duration_seconds,
        has_audio = descriptor.has_audio_stream,
        "Inspected media"
    );

    Ok(descriptor)
}

/// Turn ffprobe JSON into a descriptor.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> MediaResult<MediaDescriptor> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| MediaError::not_probeable(path, format!("malformed ffprobe output: {}", e)))?;

    let is_type = |s: &FfprobeStream, kind: &str| s.codec_type.as_deref() == Some(kind);

    let video = probe.streams.iter().find(|s| is_type(s, "video"));
    let has_audio = probe.streams.iter().any(|s| is_type(s, "audio"));

    // Missing or unparsable duration is treated as 0.0
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    MediaDescriptor::new(
        video.and_then(|v| v.width).unwrap_or(0),
        video.and_then(|v| v.height).unwrap_or(0),
        duration,
        video.is_some(),
        has_audio,
    )
    .map_err(|e| MediaError::not_probeable(path, e.to_string()))
}
