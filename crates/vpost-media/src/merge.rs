//! Concatenation of two uploaded videos.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use vpost_models::encoding::DEFAULT_AUDIO_CODEC;
use vpost_models::{EncoderCapability, EncoderProfile};

use crate::command::FfmpegCommand;
use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, FilterChain, FilterGraph};
use crate::temp::TempArtifact;

/// Joins two videos (with their audio) into one temp file.
///
/// Both inputs must carry an audio stream; there is no silence padding
/// here, so a silent input makes the merge fail.
#[derive(Clone)]
pub struct Merger {
    engine: Arc<dyn MediaEngine>,
}

impl Merger {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    /// Merge `first` then `second` into a new file under `temp_dir`.
    ///
    /// On failure the partially written file is deleted before returning.
    pub async fn merge(
        &self,
        first: &Path,
        second: &Path,
        capability: EncoderCapability,
        temp_dir: &Path,
    ) -> MediaResult<TempArtifact> {
        tokio::fs::create_dir_all(temp_dir).await?;
        let artifact =
            TempArtifact::new(temp_dir.join(format!("merged_{}.mp4", uuid::Uuid::new_v4())));

        let profile = if capability.has_gpu() {
            EncoderProfile::gpu_merge()
        } else {
            EncoderProfile::cpu_merge()
        };

        let cmd = FfmpegCommand::new(artifact.path())
            .input(first)
            .input(second)
            .filter_complex(merge_graph().render())
            .map_label("outv")
            .map_label("outa")
            .output_args(profile.to_ffmpeg_args())
            .output_args(["-c:a", DEFAULT_AUDIO_CODEC]);

        info!(
            first = %first.display(),
            second = %second.display(),
            codec = %profile.codec,
            "Merging videos"
        );

        match self.engine.run(&cmd).await {
            Ok(()) => Ok(artifact),
            Err(e) => {
                warn!(error = %e, "Merge invocation failed");
                metrics::counter!("vpost_merge_failures_total").increment(1);
                drop(artifact);
                Err(MediaError::merge_failed(e))
            }
        }
    }
}

/// `[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[outv][outa]`
fn merge_graph() -> FilterGraph {
    FilterGraph::new().chain(
        FilterChain::new()
            .input("0:v")
            .input("0:a")
            .input("1:v")
            .input("1:a")
            .filter(Filter::new("concat").kv("n", 2).kv("v", 1).kv("a", 1))
            .output("outv")
            .output("outa"),
    )
}
