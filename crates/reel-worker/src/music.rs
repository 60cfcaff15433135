//! Background music rotation.
//!
//! Tracks come from a local library directory. A track is picked at random
//! among those not yet used; once every track has been used the history is
//! cleared and the rotation starts over.

use rand::prelude::IndexedRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use reel_storage::TrackHistory;

/// Extensions admitted as background music.
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac"];

fn track_key(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_music(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MUSIC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Directory of background tracks with a durable used-track history.
pub struct MusicLibrary {
    dir: PathBuf,
    history: TrackHistory,
}

impl MusicLibrary {
    pub fn new(dir: impl Into<PathBuf>, history: TrackHistory) -> Self {
        Self {
            dir: dir.into(),
            history,
        }
    }

    pub fn history(&self) -> &TrackHistory {
        &self.history
    }

    /// Music files in the library, sorted. A missing directory is empty.
    pub async fn tracks(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), "Music library unavailable: {}", e);
                return Vec::new();
            }
        };

        let mut tracks = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if is_music(&path) && path.is_file() {
                tracks.push(path);
            }
        }
        tracks.sort();
        tracks
    }

    /// Pick a random track that has not been used yet.
    pub async fn pick(&self) -> Option<PathBuf> {
        let tracks = self.tracks().await;
        if tracks.is_empty() {
            return None;
        }

        let mut fresh = Vec::new();
        for track in &tracks {
            if let Some(key) = track_key(track) {
                if !self.history.is_used(key).await {
                    fresh.push(track.clone());
                }
            }
        }

        if fresh.is_empty() {
            info!(tracks = tracks.len(), "Every track used, restarting music rotation");
            if let Err(e) = self.history.clear().await {
                warn!("Failed to clear music history: {}", e);
            }
            fresh = tracks;
        }

        let mut rng = rand::rng();
        fresh.choose(&mut rng).cloned()
    }

    /// Record `track` as used so it is not picked again this rotation.
    pub async fn mark_used(&self, track: &Path) {
        let Some(key) = track_key(track) else {
            return;
        };
        if let Err(e) = self.history.record(key).await {
            warn!(track = key, "Failed to record used track: {}", e);
        }
    }
}
