//! Media probe and audio profile types.

use serde::{Deserialize, Serialize};

/// Mean volume below which an audio track counts as silent.
pub const DEFAULT_SILENCE_THRESHOLD_DB: f64 = -55.0;

/// Stream information derived from a media file. Recomputed per asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub width: u32,
    pub height: u32,
    /// Duration in seconds
    pub duration: f64,
    pub has_audio_track: bool,
}

impl MediaProbe {
    /// Width divided by height; zero when the height is unknown.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn is_landscape(&self) -> bool {
        self.aspect_ratio() > 1.0
    }
}

/// Audio presence and loudness of a clip. Never mutated once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioProfile {
    pub has_audio_track: bool,
    pub mean_volume_db: Option<f64>,
    pub is_silent: bool,
}

impl AudioProfile {
    /// Build a profile.
    ///
    /// A missing track is silent. A track whose loudness could not be
    /// measured is treated as audible.
    pub fn new(has_audio_track: bool, mean_volume_db: Option<f64>, threshold_db: f64) -> Self {
        let is_silent = if !has_audio_track {
            true
        } else {
            matches!(mean_volume_db, Some(db) if db < threshold_db)
        };

        Self {
            has_audio_track,
            mean_volume_db,
            is_silent,
        }
    }

    /// Profile of a clip without any audio stream.
    pub fn no_audio() -> Self {
        Self {
            has_audio_track: false,
            mean_volume_db: None,
            is_silent: true,
        }
    }

    /// Whether the original audio should be kept audible in the mix.
    pub fn has_usable_audio(&self) -> bool {
        self.has_audio_track && !self.is_silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_track_is_silent() {
        let profile = AudioProfile::new(false, Some(-10.0), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!(profile.is_silent);
        assert!(!profile.has_usable_audio());
    }

    #[test]
    fn test_quiet_track_is_silent() {
        let profile = AudioProfile::new(true, Some(-70.0), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!(profile.is_silent);
    }

    #[test]
    fn test_loud_track_is_audible() {
        let profile = AudioProfile::new(true, Some(-20.0), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!(!profile.is_silent);
        assert!(profile.has_usable_audio());
    }

    #[test]
    fn test_unmeasured_track_fails_open() {
        let profile = AudioProfile::new(true, None, DEFAULT_SILENCE_THRESHOLD_DB);
        assert!(!profile.is_silent);
    }

    #[test]
    fn test_aspect_ratio() {
        let probe = MediaProbe {
            width: 1920,
            height: 1080,
            duration: 12.0,
            has_audio_track: true,
        };
        assert!(probe.is_landscape());

        let degenerate = MediaProbe { height: 0, ..probe };
        assert_eq!(degenerate.aspect_ratio(), 0.0);
    }
}
