//! GPU/CPU encode selection.
//!
//! The GPU tier is attempted at most once, and only when the capability
//! probe found `h264_nvenc`. Any GPU failure falls through to a single CPU
//! attempt with the same filter plan. Output is written to a sibling
//! `*.partial.mp4` and moved into place only after a clean exit, so a file
//! at the final path is always complete.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use vpost_models::{EncoderCapability, EncoderProfile, EncoderTier};

use crate::command::FfmpegCommand;
use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, partial_path, remove_if_exists};
use crate::plan::FilterPlan;

/// Inputs of the main pass, in filter-graph index order.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInputs<'a> {
    /// Input 0
    pub primary: &'a Path,
    /// Input 1
    pub outro: &'a Path,
}

/// Runs the main watermark/outro pass on the best available tier.
#[derive(Clone)]
pub struct EncodeStrategy {
    engine: Arc<dyn MediaEngine>,
}

impl EncodeStrategy {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    /// Encode with GPU when available, falling back to CPU once.
    ///
    /// Returns the tier that produced `output`.
    pub async fn encode(
        &self,
        inputs: EncodeInputs<'_>,
        plan: &FilterPlan,
        capability: EncoderCapability,
        output: &Path,
    ) -> MediaResult<EncoderTier> {
        if capability.has_gpu() {
            match self.encode_gpu(inputs, plan, output).await {
                Ok(()) => return Ok(EncoderTier::Gpu),
                Err(e) => warn!(error = %e, "GPU encode failed, retrying on CPU"),
            }
        }

        self.encode_cpu(inputs, plan, output).await?;
        Ok(EncoderTier::Cpu)
    }

    /// Single GPU attempt.
    pub async fn encode_gpu(
        &self,
        inputs: EncodeInputs<'_>,
        plan: &FilterPlan,
        output: &Path,
    ) -> MediaResult<()> {
        self.encode_with(EncoderProfile::gpu(), inputs, plan, output).await
    }

    /// Single CPU attempt.
    pub async fn encode_cpu(
        &self,
        inputs: EncodeInputs<'_>,
        plan: &FilterPlan,
        output: &Path,
    ) -> MediaResult<()> {
        self.encode_with(EncoderProfile::cpu(), inputs, plan, output).await
    }

    async fn encode_with(
        &self,
        profile: EncoderProfile,
        inputs: EncodeInputs<'_>,
        plan: &FilterPlan,
        output: &Path,
    ) -> MediaResult<()> {
        let tier = profile.tier;
        let partial = partial_path(output);

        let cmd = FfmpegCommand::new(&partial)
            .input(inputs.primary)
            .input(inputs.outro);
        let cmd = plan
            .apply(cmd)
            .output_args(profile.to_ffmpeg_args())
            .faststart();

        info!(
            tier = %tier,
            codec = %profile.codec,
            output = %output.display(),
            "Starting encode"
        );

        let result = match self.engine.run(&cmd).await {
            Ok(()) => move_file(&partial, output).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                metrics::counter!("vpost_encode_attempts_total", "tier" => tier.as_str(), "outcome" => "success")
                    .increment(1);
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&partial).await {
                    warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial output");
                }
                metrics::counter!("vpost_encode_attempts_total", "tier" => tier.as_str(), "outcome" => "failure")
                    .increment(1);
                Err(MediaError::encode_failed(tier, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan;
    use crate::testing::FakeEngine;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio_test::assert_ok;
    use vpost_models::MediaDescriptor;

    struct Fixture {
        _dir: TempDir,
        primary: PathBuf,
        outro: PathBuf,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        Fixture {
            primary: dir.path().join("upload.mp4"),
            outro: dir.path().join("outro.mp4"),
            output: dir.path().join("output_job.mp4"),
            _dir: dir,
        }
    }

    fn engine(base: FakeEngine, fx: &Fixture) -> Arc<FakeEngine> {
        Arc::new(
            base.with_media(&fx.primary, 1920, 1080, true)
                .with_media(&fx.outro, 1280, 720, true),
        )
    }

    fn test_plan() -> FilterPlan {
        let primary = MediaDescriptor::new(1920, 1080, 10.0, true, true).unwrap();
        let outro = MediaDescriptor::new(1280, 720, 3.0, true, true).unwrap();
        plan::build(&primary, &outro, Path::new("wm.png"))
    }

    fn inputs(fx: &Fixture) -> EncodeInputs<'_> {
        EncodeInputs {
            primary: &fx.primary,
            outro: &fx.outro,
        }
    }

    #[tokio::test]
    async fn test_gpu_success_runs_once() {
        let fx = fixture();
        let engine = engine(FakeEngine::gpu(), &fx);
        let strategy = EncodeStrategy::new(engine.clone());

        let tier = assert_ok!(
            strategy
                .encode(inputs(&fx), &test_plan(), EncoderCapability::GpuH264, &fx.output)
                .await
        );

        assert_eq!(tier, EncoderTier::Gpu);
        assert_eq!(engine.codecs_run(), vec!["h264_nvenc"]);
        assert!(fx.output.exists());
        assert!(!partial_path(&fx.output).exists());
    }

    #[tokio::test]
    async fn test_gpu_failure_falls_back_to_cpu_once() {
        let fx = fixture();
        let engine = engine(FakeEngine::gpu().with_broken_codec("h264_nvenc"), &fx);
        let strategy = EncodeStrategy::new(engine.clone());
        let plan = test_plan();

        let tier = strategy
            .encode(inputs(&fx), &plan, EncoderCapability::GpuH264, &fx.output)
            .await
            .unwrap();

        assert_eq!(tier, EncoderTier::Cpu);
        assert_eq!(engine.codecs_run(), vec!["h264_nvenc", "libx264"]);

        // Same plan on both tiers
        let calls = engine.calls();
        let graph_of = |cmd: &FfmpegCommand| {
            let args = cmd.build_args();
            let i = args.iter().position(|a| a == "-filter_complex").unwrap();
            args[i + 1].clone()
        };
        assert_eq!(graph_of(&calls[0]), graph_of(&calls[1]));
        assert_eq!(graph_of(&calls[1]), plan.graph_expression());
    }

    #[tokio::test]
    async fn test_gpu_timeout_falls_back_to_cpu() {
        let fx = fixture();
        let engine = engine(FakeEngine::gpu().with_timed_out_codec("h264_nvenc"), &fx);
        let strategy = EncodeStrategy::new(engine.clone());
        let plan = test_plan();

        let gpu_err = strategy
            .encode_gpu(inputs(&fx), &plan, &fx.output)
            .await
            .unwrap_err();
        match gpu_err {
            MediaError::EncodeError { tier, message, .. } => {
                assert_eq!(tier, EncoderTier::Gpu);
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!partial_path(&fx.output).exists());

        let tier = strategy
            .encode(inputs(&fx), &plan, EncoderCapability::GpuH264, &fx.output)
            .await
            .unwrap();
        assert_eq!(tier, EncoderTier::Cpu);
        assert_eq!(
            engine.codecs_run(),
            vec!["h264_nvenc", "h264_nvenc", "libx264"]
        );
        assert!(fx.output.is_file());
    }

    #[tokio::test]
    async fn test_no_capability_skips_gpu() {
        for capability in [EncoderCapability::None, EncoderCapability::CpuOnly] {
            let fx = fixture();
            let engine = engine(FakeEngine::unreachable(), &fx);
            let strategy = EncodeStrategy::new(engine.clone());

            let tier = strategy
                .encode(inputs(&fx), &test_plan(), capability, &fx.output)
                .await
                .unwrap();

            assert_eq!(tier, EncoderTier::Cpu);
            assert_eq!(engine.codecs_run(), vec!["libx264"]);
        }
    }

    #[tokio::test]
    async fn test_both_tiers_fail() {
        let fx = fixture();
        let engine = engine(
            FakeEngine::gpu()
                .with_broken_codec("h264_nvenc")
                .with_broken_codec("libx264"),
            &fx,
        );
        let strategy = EncodeStrategy::new(engine.clone());

        let err = strategy
            .encode(inputs(&fx), &test_plan(), EncoderCapability::GpuH264, &fx.output)
            .await
            .unwrap_err();

        match err {
            MediaError::EncodeError { tier, stderr, .. } => {
                assert_eq!(tier, EncoderTier::Cpu);
                assert!(stderr.unwrap().contains("libx264"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.codecs_run().len(), 2);
        assert!(!fx.output.exists());
        assert!(!partial_path(&fx.output).exists());
    }

    #[tokio::test]
    async fn test_output_args_include_faststart_and_overwrite() {
        let fx = fixture();
        let engine = engine(FakeEngine::cpu_only(), &fx);
        let strategy = EncodeStrategy::new(engine.clone());

        strategy
            .encode_cpu(inputs(&fx), &test_plan(), &fx.output)
            .await
            .unwrap();

        let args = engine.calls()[0].build_args();
        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w[0] == "-movflags" && w[1] == "+faststart"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "26"));
        assert_eq!(args.last().unwrap(), &partial_path(&fx.output).to_string_lossy());
    }
}
