//! Raw assets and their lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Source-unique identifier of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of media delivered by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Video,
    /// GIF-like sources; never carry audio and always need a transcode.
    AnimatedImage,
}

impl MediaKind {
    /// Guess the media kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "webm" | "mov" | "mkv" | "m4v" => Some(MediaKind::Video),
            "gif" | "gifv" => Some(MediaKind::AnimatedImage),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::AnimatedImage => write!(f, "animated_image"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = MediaKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "animated_image" | "gif" => Ok(MediaKind::AnimatedImage),
            _ => Err(MediaKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown media kind: {0}")]
pub struct MediaKindParseError(String);

/// One downloaded source clip plus its metadata.
///
/// Created by a collector, consumed once by the pipeline and deleted after
/// the asset reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAsset {
    pub id: AssetId,
    pub path: PathBuf,
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl RawAsset {
    pub fn new(id: impl Into<AssetId>, path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            title: title.into(),
            kind: MediaKind::Video,
            source_url: None,
        }
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// Per-asset pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Downloaded,
    Normalized,
    Captioned,
    AudioAnalyzed,
    Mixed,
    ThumbnailExtracted,
    Published,
    CleanedUp,
    Aborted,
}

impl AssetState {
    /// Whether the state ends the asset's pipeline run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssetState::Published | AssetState::CleanedUp | AssetState::Aborted
        )
    }

    /// Forward transition on success. Terminal states map to themselves.
    pub fn next(&self) -> AssetState {
        match self {
            AssetState::Downloaded => AssetState::Normalized,
            AssetState::Normalized => AssetState::Captioned,
            AssetState::Captioned => AssetState::AudioAnalyzed,
            AssetState::AudioAnalyzed => AssetState::Mixed,
            AssetState::Mixed => AssetState::ThumbnailExtracted,
            AssetState::ThumbnailExtracted => AssetState::Published,
            AssetState::Published => AssetState::CleanedUp,
            AssetState::CleanedUp => AssetState::CleanedUp,
            AssetState::Aborted => AssetState::Aborted,
        }
    }

    /// Only probe and transform failures may abort an asset.
    pub fn can_abort(&self) -> bool {
        matches!(self, AssetState::Downloaded | AssetState::Normalized)
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetState::Downloaded => "downloaded",
            AssetState::Normalized => "normalized",
            AssetState::Captioned => "captioned",
            AssetState::AudioAnalyzed => "audio_analyzed",
            AssetState::Mixed => "mixed",
            AssetState::ThumbnailExtracted => "thumbnail_extracted",
            AssetState::Published => "published",
            AssetState::CleanedUp => "cleaned_up",
            AssetState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
