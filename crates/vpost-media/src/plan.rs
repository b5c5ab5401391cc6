//! Watermark + outro filter plan.
//!
//! The plan takes input 0 (the finalized primary video) and input 1 (the
//! outro), scales the outro to the primary's frame size, concatenates the
//! two video streams, and overlays the full-frame watermark over the whole
//! result at constant opacity. Audio follows one of three policies decided
//! by which inputs carry an audio stream.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vpost_models::encoding::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, SILENCE_CHANNEL_LAYOUT, SILENCE_SAMPLE_RATE,
    WATERMARK_OPACITY,
};
use vpost_models::MediaDescriptor;

use crate::command::FfmpegCommand;
use crate::graph::{Filter, FilterChain, FilterGraph};

/// Final video pad.
pub const OUT_VIDEO: &str = "outv";
/// Final audio pad.
pub const OUT_AUDIO: &str = "outa";

/// How the output audio track is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioPolicy {
    /// Primary audio followed by outro audio
    ConcatBoth,
    /// Primary audio followed by generated silence
    PadOutroWithSilence,
    /// Output has no audio track
    NoAudio,
}

impl AudioPolicy {
    /// Pick the policy for a primary/outro pair.
    ///
    /// Audio is only produced when the primary has it; an outro with audio
    /// after a silent primary still yields `NoAudio`.
    pub fn select(primary: &MediaDescriptor, outro: &MediaDescriptor) -> Self {
        match (primary.has_audio_stream, outro.has_audio_stream) {
            (true, true) => AudioPolicy::ConcatBoth,
            (true, false) => AudioPolicy::PadOutroWithSilence,
            (false, _) => AudioPolicy::NoAudio,
        }
    }

    pub fn has_audio(&self) -> bool {
        !matches!(self, AudioPolicy::NoAudio)
    }
}

/// Filter graph plus the mappings and audio arguments that go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    graph: FilterGraph,
    output_mappings: Vec<String>,
    audio_codec_args: Vec<String>,
    audio_policy: AudioPolicy,
}

impl FilterPlan {
    /// Rendered `-filter_complex` text.
    pub fn graph_expression(&self) -> String {
        self.graph.render()
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    /// Pads to `-map`, video first.
    pub fn output_mappings(&self) -> &[String] {
        &self.output_mappings
    }

    pub fn audio_codec_args(&self) -> &[String] {
        &self.audio_codec_args
    }

    pub fn audio_policy(&self) -> AudioPolicy {
        self.audio_policy
    }

    /// Attach graph, mappings and audio arguments to a command.
    pub fn apply(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        let cmd = cmd.filter_complex(self.graph_expression());
        let cmd = self
            .output_mappings
            .iter()
            .fold(cmd, |cmd, label| cmd.map_label(label));
        cmd.output_args(self.audio_codec_args.iter().cloned())
    }
}

/// Build the plan for a primary video, the outro and the watermark image.
///
/// Pure: identical descriptors and path always produce an identical plan.
pub fn build(primary: &MediaDescriptor, outro: &MediaDescriptor, watermark: &Path) -> FilterPlan {
    let (w, h) = (primary.width, primary.height);
    let audio_policy = AudioPolicy::select(primary, outro);
    let scale = || Filter::new("scale").arg(w).arg(h);

    let mut graph = FilterGraph::new().chain(
        FilterChain::new()
            .input("1:v")
            .filter(scale())
            .output("outro_scaled"),
    );

    // anullsrc without a duration never ends, so the silence is cut to the outro length
    if audio_policy == AudioPolicy::PadOutroWithSilence {
        graph.push(
            FilterChain::new()
                .filter(
                    Filter::new("anullsrc")
                        .kv("channel_layout", SILENCE_CHANNEL_LAYOUT)
                        .kv("sample_rate", SILENCE_SAMPLE_RATE)
                        .kv("d", format!("{:.3}", outro.duration_seconds)),
                )
                .output("silence"),
        );
    }

    graph.push(
        FilterChain::new()
            .input("0:v")
            .input("outro_scaled")
            .filter(concat(1, 0))
            .output("concat_v"),
    );
    graph.push(
        FilterChain::new()
            .filter(Filter::new("movie").quoted(watermark.to_string_lossy()))
            .output("wm"),
    );
    graph.push(
        FilterChain::new()
            .input("wm")
            .filter(scale())
            .filter(Filter::new("format").arg("rgba"))
            .filter(Filter::new("colorchannelmixer").kv("aa", WATERMARK_OPACITY))
            .output("wm_scaled"),
    );
    graph.push(
        FilterChain::new()
            .input("concat_v")
            .input("wm_scaled")
            .filter(Filter::new("overlay").arg(0).arg(0))
            .output(OUT_VIDEO),
    );

    let second_audio = match audio_policy {
        AudioPolicy::ConcatBoth => Some("1:a"),
        AudioPolicy::PadOutroWithSilence => Some("silence"),
        AudioPolicy::NoAudio => None,
    };
    if let Some(second) = second_audio {
        graph.push(
            FilterChain::new()
                .input("0:a")
                .input(second)
                .filter(concat(0, 1))
                .output(OUT_AUDIO),
        );
    }

    let (output_mappings, audio_codec_args) = if audio_policy.has_audio() {
        (
            vec![OUT_VIDEO.to_string(), OUT_AUDIO.to_string()],
            vec![
                "-c:a".to_string(),
                DEFAULT_AUDIO_CODEC.to_string(),
                "-b:a".to_string(),
                DEFAULT_AUDIO_BITRATE.to_string(),
            ],
        )
    } else {
        (vec![OUT_VIDEO.to_string()], vec!["-an".to_string()])
    };

    FilterPlan {
        graph,
        output_mappings,
        audio_codec_args,
        audio_policy,
    }
}

fn concat(video: u8, audio: u8) -> Filter {
    Filter::new("concat").kv("n", 2).kv("v", video).kv("a", audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(w: u32, h: u32, audio: bool) -> MediaDescriptor {
        MediaDescriptor::new(w, h, 10.0, true, audio).unwrap()
    }

    fn wm() -> &'static Path {
        Path::new("assets/watermark.png")
    }

    #[test]
    fn test_both_audio_concatenates() {
        let plan = build(&media(1920, 1080, true), &media(1280, 720, true), wm());

        assert_eq!(plan.audio_policy(), AudioPolicy::ConcatBoth);
        assert_eq!(plan.output_mappings(), &["outv", "outa"]);
        assert_eq!(plan.audio_codec_args(), &["-c:a", "aac", "-b:a", "128k"]);
        assert_eq!(
            plan.graph_expression(),
            "[1:v]scale=1920:1080[outro_scaled];\
             [0:v][outro_scaled]concat=n=2:v=1:a=0[concat_v];\
             movie='assets/watermark.png'[wm];\
             [wm]scale=1920:1080,format=rgba,colorchannelmixer=aa=0.3[wm_scaled];\
             [concat_v][wm_scaled]overlay=0:0[outv];\
             [0:a][1:a]concat=n=2:v=0:a=1[outa]"
        );
    }

    #[test]
    fn test_silent_outro_is_padded() {
        let plan = build(&media(1280, 720, true), &media(1920, 1080, false), wm());
        let expr = plan.graph_expression();

        assert_eq!(plan.audio_policy(), AudioPolicy::PadOutroWithSilence);
        assert_eq!(plan.output_mappings(), &["outv", "outa"]);
        assert!(expr.contains("anullsrc=channel_layout=stereo:sample_rate=48000:d=10.000[silence]"));
        assert!(expr.contains("[0:a][silence]concat=n=2:v=0:a=1[outa]"));
        assert!(expr.contains("[1:v]scale=1280:720[outro_scaled]"));
    }

    #[test]
    fn test_silence_lasts_as_long_as_outro() {
        let outro = MediaDescriptor::new(1280, 720, 4.5, true, false).unwrap();
        let plan = build(&media(1280, 720, true), &outro, wm());

        let silence = plan
            .graph_expression()
            .split(';')
            .find(|chain| chain.ends_with("[silence]"))
            .map(str::to_string)
            .unwrap();
        assert!(silence.starts_with("anullsrc="));
        assert!(silence.contains(":d=4.500"), "unbounded silence: {silence}");
    }

    #[test]
    fn test_zero_duration_primary_still_builds() {
        let primary = MediaDescriptor::new(1280, 720, 0.0, true, true).unwrap();
        let plan = build(&primary, &media(1280, 720, true), wm());

        assert_eq!(plan.audio_policy(), AudioPolicy::ConcatBoth);
        assert_eq!(plan.output_mappings(), &["outv", "outa"]);
        assert!(plan.graph_expression().contains("[0:v][outro_scaled]concat=n=2:v=1:a=0"));
    }

    #[test]
    fn test_silent_primary_drops_audio() {
        let plan = build(&media(1280, 720, false), &media(1920, 1080, true), wm());

        assert_eq!(plan.audio_policy(), AudioPolicy::NoAudio);
        assert_eq!(plan.output_mappings(), &["outv"]);
        assert_eq!(plan.audio_codec_args(), &["-an"]);
        assert!(!plan.graph().defines(OUT_AUDIO));
        assert!(!plan.graph_expression().contains("0:a"));
    }

    #[test]
    fn test_outa_mapped_iff_audio_policy() {
        for (p, o) in [(true, true), (true, false), (false, true), (false, false)] {
            let plan = build(&media(640, 360, p), &media(640, 360, o), wm());
            let maps_audio = plan.output_mappings().iter().any(|m| m == OUT_AUDIO);

            assert_eq!(plan.output_mappings()[0], OUT_VIDEO);
            assert_eq!(maps_audio, plan.audio_policy().has_audio());
            assert_eq!(maps_audio, plan.graph().defines(OUT_AUDIO));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let primary = media(1080, 1920, true);
        let outro = media(1920, 1080, false);

        assert_eq!(build(&primary, &outro, wm()), build(&primary, &outro, wm()));
    }

    #[test]
    fn test_watermark_path_escaped() {
        let plan = build(&media(640, 360, false), &media(640, 360, false), Path::new("/a:b/w'm.png"));
        assert!(plan.graph_expression().contains("movie='/a\\:b/w\\'m.png'[wm]"));
    }

    #[test]
    fn test_apply_to_command() {
        let plan = build(&media(1920, 1080, true), &media(1920, 1080, true), wm());
        let args = plan
            .apply(FfmpegCommand::new("out.mp4").input("a.mp4").input("outro.mp4"))
            .build_args();

        let maps: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(maps, vec!["[outv]", "[outa]"]);
        assert!(args.contains(&"-filter_complex".to_string()));
    }
}
