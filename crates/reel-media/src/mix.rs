//! Audio mixing engine.
//!
//! Chooses which of {original audio, narration, background music} end up in
//! the output and combines them with static gains into one track. Background
//! music loops and is trimmed to the video's duration.

use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::{AudioProfile, EncodingConfig, MixInput, MixSource, MixSpec, MixTopology};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::format_gain;

/// Output pad label of the mix graph.
const AUDIO_OUT: &str = "[aout]";

/// Static gain factors per topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixGains {
    /// Original audio when music is also present
    pub original_with_music: f64,
    /// Original audio with narration only
    pub original_without_music: f64,
    pub narration: f64,
    /// Music under original audio and narration
    pub music_under_original: f64,
    /// Music as the only ambient layer under narration
    pub music_under_narration: f64,
    /// Music filling an otherwise silent clip
    pub music_alone: f64,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            original_with_music: 0.8,
            original_without_music: 1.0,
            narration: 2.5,
            music_under_original: 0.1,
            music_under_narration: 0.25,
            music_alone: 0.3,
        }
    }
}

/// Decision table over (original audio, narration, background music).
pub fn select_topology(has_original: bool, has_narration: bool, music_available: bool) -> MixTopology {
    match (has_original, has_narration, music_available) {
        (true, true, true) => MixTopology::OriginalNarrationMusic,
        (true, true, false) => MixTopology::OriginalNarration,
        (true, false, _) => MixTopology::OriginalPassthrough,
        (false, true, true) => MixTopology::NarrationMusic,
        (false, true, false) => MixTopology::NarrationOnly,
        (false, false, true) => MixTopology::MusicOnly,
        (false, false, false) => MixTopology::Silent,
    }
}

/// Topology for a profiled clip. Silent tracks count as no original audio.
pub fn topology_for(profile: &AudioProfile, has_narration: bool, music_available: bool) -> MixTopology {
    select_topology(profile.has_usable_audio(), has_narration, music_available)
}

/// Attach gains and loop flags to a topology.
pub fn build_mix_spec(topology: MixTopology, gains: &MixGains) -> MixSpec {
    let has_original = topology.sources().contains(&MixSource::Original);
    let has_narration = topology.sources().contains(&MixSource::Narration);

    let inputs = topology
        .sources()
        .iter()
        .map(|&source| {
            let gain = match source {
                MixSource::Original if topology == MixTopology::OriginalPassthrough => 1.0,
                MixSource::Original if topology.sources().contains(&MixSource::BackgroundMusic) => {
                    gains.original_with_music
                }
                MixSource::Original => gains.original_without_music,
                MixSource::Narration => gains.narration,
                MixSource::BackgroundMusic if has_original => gains.music_under_original,
                MixSource::BackgroundMusic if has_narration => gains.music_under_narration,
                MixSource::BackgroundMusic => gains.music_alone,
            };
            MixInput {
                source,
                gain,
                looped: source == MixSource::BackgroundMusic,
            }
        })
        .collect();

    MixSpec { topology, inputs }
}

/// Input index of each source on the FFmpeg command line.
///
/// The video is always input 0 and carries the original audio; narration and
/// music follow in spec order.
fn input_indices(spec: &MixSpec) -> Vec<(MixInput, usize)> {
    let mut next_extra = 1;
    spec.inputs
        .iter()
        .map(|input| {
            let index = if input.source == MixSource::Original {
                0
            } else {
                let index = next_extra;
                next_extra += 1;
                index
            };
            (*input, index)
        })
        .collect()
}

/// Build the audio filter graph for a spec. `None` when nothing is mixed.
pub fn mix_filter(spec: &MixSpec) -> Option<String> {
    if !spec.topology.requires_mix() || spec.inputs.is_empty() {
        return None;
    }

    let indexed = input_indices(spec);

    if let [(input, index)] = indexed.as_slice() {
        return Some(format!(
            "[{index}:a]volume={}{AUDIO_OUT}",
            format_gain(input.gain)
        ));
    }

    let mut chains: Vec<String> = indexed
        .iter()
        .map(|(input, index)| {
            format!(
                "[{index}:a]volume={}[{}]",
                format_gain(input.gain),
                input.source.label()
            )
        })
        .collect();

    let labels: String = indexed
        .iter()
        .map(|(input, _)| format!("[{}]", input.source.label()))
        .collect();

    chains.push(format!(
        "{labels}amix=inputs={}:duration=first:dropout_transition=0:normalize=0{AUDIO_OUT}",
        indexed.len()
    ));

    Some(chains.join(";"))
}

/// Audio files available to the mix.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixAssets<'a> {
    pub narration: Option<&'a Path>,
    pub music: Option<&'a Path>,
}

/// Execute a mix spec against a normalized clip.
///
/// Original passthrough returns `video` unchanged. A silent topology strips
/// any audio. The output is bounded by `duration` (the video's own).
pub async fn apply_mix(
    video: &Path,
    output: &Path,
    spec: &MixSpec,
    assets: MixAssets<'_>,
    duration: f64,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    if !spec.topology.requires_mix() {
        return Ok(video.to_path_buf());
    }

    info!(
        video = %video.display(),
        topology = %spec.topology,
        "Mixing audio"
    );

    let mut cmd = FfmpegCommand::new(video, output);

    for (input, _) in input_indices(spec) {
        match input.source {
            MixSource::Original => {}
            MixSource::Narration => {
                let path = assets
                    .narration
                    .ok_or_else(|| MediaError::invalid_input("mix needs narration but none was given"))?;
                cmd = cmd.input(path);
            }
            MixSource::BackgroundMusic => {
                let path = assets
                    .music
                    .ok_or_else(|| MediaError::invalid_input("mix needs music but none was given"))?;
                cmd = cmd.input(path);
                if input.looped {
                    cmd = cmd.stream_loop();
                }
            }
        }
    }

    cmd = cmd.map("0:v").copy_video();

    cmd = match mix_filter(spec) {
        Some(graph) => cmd.filter_complex(graph).map(AUDIO_OUT).encode_audio(encoding),
        None => cmd.no_audio(),
    };

    let cmd = cmd.duration(duration).faststart();
    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_all_combinations() {
        let mut seen = Vec::new();
        for has_original in [true, false] {
            for has_narration in [true, false] {
                for music in [true, false] {
                    let topology = select_topology(has_original, has_narration, music);
                    let sources = topology.sources();
                    assert_eq!(sources.contains(&MixSource::Original), has_original);
                    assert_eq!(sources.contains(&MixSource::Narration), has_narration);
                    if has_original && !has_narration {
                        assert_eq!(topology, MixTopology::OriginalPassthrough);
                    } else {
                        assert_eq!(sources.contains(&MixSource::BackgroundMusic), music);
                    }
                    seen.push(topology);
                }
            }
        }
        assert_eq!(seen.len(), 8);
        for topology in MixTopology::ALL {
            assert!(seen.contains(topology), "{topology} unreachable");
        }
    }

    #[test]
    fn test_full_mix_gains() {
        let spec = build_mix_spec(MixTopology::OriginalNarrationMusic, &MixGains::default());
        assert_eq!(spec.gain_of(MixSource::Original), Some(0.8));
        let narration = spec.gain_of(MixSource::Narration).unwrap();
        assert!((1.8..=2.5).contains(&narration));
        let music = spec.gain_of(MixSource::BackgroundMusic).unwrap();
        assert!((0.1..=0.15).contains(&music));
    }

    #[test]
    fn test_music_louder_without_original() {
        let gains = MixGains::default();
        let with_original = build_mix_spec(MixTopology::OriginalNarrationMusic, &gains);
        let without_original = build_mix_spec(MixTopology::NarrationMusic, &gains);
        let under = without_original.gain_of(MixSource::BackgroundMusic).unwrap();
        assert!((0.2..=0.3).contains(&under));
        assert!(under > with_original.gain_of(MixSource::BackgroundMusic).unwrap());
    }

    #[test]
    fn test_only_music_loops() {
        let spec = build_mix_spec(MixTopology::OriginalNarrationMusic, &MixGains::default());
        for input in &spec.inputs {
            assert_eq!(input.looped, input.source == MixSource::BackgroundMusic);
        }
    }

    #[test]
    fn test_full_mix_filter() {
        let spec = build_mix_spec(MixTopology::OriginalNarrationMusic, &MixGains::default());
        let graph = mix_filter(&spec).unwrap();
        assert_eq!(
            graph,
            "[0:a]volume=0.8[orig];[1:a]volume=2.5[narr];[2:a]volume=0.1[bgm];\
             [orig][narr][bgm]amix=inputs=3:duration=first:dropout_transition=0:normalize=0[aout]"
        );
    }

    #[test]
    fn test_narration_music_filter_indices() {
        let spec = build_mix_spec(MixTopology::NarrationMusic, &MixGains::default());
        let graph = mix_filter(&spec).unwrap();
        assert!(graph.starts_with("[1:a]volume=2.5[narr];[2:a]volume=0.25[bgm];"));
        assert!(graph.contains("amix=inputs=2"));
    }

    #[test]
    fn test_single_source_filters() {
        let gains = MixGains::default();
        assert_eq!(
            mix_filter(&build_mix_spec(MixTopology::NarrationOnly, &gains)).unwrap(),
            "[1:a]volume=2.5[aout]"
        );
        assert_eq!(
            mix_filter(&build_mix_spec(MixTopology::MusicOnly, &gains)).unwrap(),
            "[1:a]volume=0.3[aout]"
        );
    }

    #[test]
    fn test_passthrough_and_silent_have_no_graph() {
        let gains = MixGains::default();
        assert!(mix_filter(&build_mix_spec(MixTopology::OriginalPassthrough, &gains)).is_none());
        assert!(mix_filter(&build_mix_spec(MixTopology::Silent, &gains)).is_none());
    }

    #[test]
    fn test_silent_profile_counts_as_no_original() {
        let silent = AudioProfile::new(true, Some(-80.0), -55.0);
        assert_eq!(topology_for(&silent, true, false), MixTopology::NarrationOnly);
        assert_eq!(topology_for(&AudioProfile::no_audio(), false, false), MixTopology::Silent);
    }

    #[tokio::test]
    async fn test_passthrough_returns_video_without_running_tool() {
        let spec = build_mix_spec(MixTopology::OriginalPassthrough, &MixGains::default());
        let video = Path::new("/nonexistent/video.mp4");
        let result = apply_mix(
            video,
            Path::new("/nonexistent/out.mp4"),
            &spec,
            MixAssets::default(),
            10.0,
            &EncodingConfig::default(),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap();
        assert_eq!(result, video);
    }
}
