//! Audio mix topology and spec types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An audio source that can take part in the final mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixSource {
    Original,
    Narration,
    BackgroundMusic,
}

impl MixSource {
    /// Label used inside filter graphs.
    pub fn label(&self) -> &'static str {
        match self {
            MixSource::Original => "orig",
            MixSource::Narration => "narr",
            MixSource::BackgroundMusic => "bgm",
        }
    }
}

/// Which sources end up in the output track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixTopology {
    OriginalNarrationMusic,
    OriginalNarration,
    /// Keep the clip's own audio untouched.
    OriginalPassthrough,
    NarrationMusic,
    NarrationOnly,
    MusicOnly,
    /// Output carries no audio track at all.
    Silent,
}

impl MixTopology {
    /// Every topology, in table order.
    pub const ALL: &'static [MixTopology] = &[
        MixTopology::OriginalNarrationMusic,
        MixTopology::OriginalNarration,
        MixTopology::OriginalPassthrough,
        MixTopology::NarrationMusic,
        MixTopology::NarrationOnly,
        MixTopology::MusicOnly,
        MixTopology::Silent,
    ];

    /// Sources read by this topology, in input order.
    pub fn sources(&self) -> &'static [MixSource] {
        match self {
            MixTopology::OriginalNarrationMusic => &[
                MixSource::Original,
                MixSource::Narration,
                MixSource::BackgroundMusic,
            ],
            MixTopology::OriginalNarration => &[MixSource::Original, MixSource::Narration],
            MixTopology::OriginalPassthrough => &[MixSource::Original],
            MixTopology::NarrationMusic => &[MixSource::Narration, MixSource::BackgroundMusic],
            MixTopology::NarrationOnly => &[MixSource::Narration],
            MixTopology::MusicOnly => &[MixSource::BackgroundMusic],
            MixTopology::Silent => &[],
        }
    }

    /// Whether executing the topology needs a mix pass at all.
    pub fn requires_mix(&self) -> bool {
        !matches!(self, MixTopology::OriginalPassthrough)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MixTopology::OriginalNarrationMusic => "original_narration_music",
            MixTopology::OriginalNarration => "original_narration",
            MixTopology::OriginalPassthrough => "original_passthrough",
            MixTopology::NarrationMusic => "narration_music",
            MixTopology::NarrationOnly => "narration_only",
            MixTopology::MusicOnly => "music_only",
            MixTopology::Silent => "silent",
        }
    }
}

impl fmt::Display for MixTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled input of a mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixInput {
    pub source: MixSource,
    pub gain: f64,
    /// Loop the source indefinitely; the output duration bounds it.
    pub looped: bool,
}

/// Ordered inputs combined into one output track.
///
/// The combined track is bounded by the first input's duration, and the
/// output as a whole by the video's own duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSpec {
    pub topology: MixTopology,
    pub inputs: Vec<MixInput>,
}

impl MixSpec {
    pub fn gain_of(&self, source: MixSource) -> Option<f64> {
        self.inputs
            .iter()
            .find(|input| input.source == source)
            .map(|input| input.gain)
    }

    pub fn uses(&self, source: MixSource) -> bool {
        self.inputs.iter().any(|input| input.source == source)
    }
}
