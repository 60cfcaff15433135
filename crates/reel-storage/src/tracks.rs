//! Used background-music history.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::LedgerResult;
use crate::json_set::{load_set, write_set};

/// Durable set of background tracks already used in published shorts.
///
/// Unlike the asset ledger this set may be cleared, once a music library has
/// been played through.
#[derive(Debug)]
pub struct TrackHistory {
    path: PathBuf,
    used: Mutex<BTreeSet<String>>,
}

impl TrackHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            used: Mutex::new(BTreeSet::new()),
        }
    }

    /// Load from `path`; missing or corrupt files give an empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let used = load_set(&path).await;
        info!(path = %path.display(), tracks = used.len(), "Loaded music history");

        Self {
            path,
            used: Mutex::new(used),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn is_used(&self, track: &str) -> bool {
        self.used.lock().await.contains(track)
    }

    pub async fn len(&self) -> usize {
        self.used.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.used.lock().await.is_empty()
    }

    /// Mark `track` used and persist.
    pub async fn record(&self, track: &str) -> LedgerResult<()> {
        let mut used = self.used.lock().await;
        used.insert(track.to_string());
        write_set(&self.path, &used).await?;
        debug!(track, "Recorded used track");
        Ok(())
    }

    /// Forget every track and persist the empty history.
    pub async fn clear(&self) -> LedgerResult<()> {
        let mut used = self.used.lock().await;
        used.clear();
        write_set(&self.path, &used).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("music_history.json");

        let history = TrackHistory::load(&path).await;
        assert!(history.is_empty().await);
        history.record("upbeat.mp3").await.unwrap();

        let reloaded = TrackHistory::load(&path).await;
        assert!(reloaded.is_used("upbeat.mp3").await);
        assert!(!reloaded.is_used("calm.mp3").await);
    }

    #[tokio::test]
    async fn test_clear_is_durable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("music_history.json");

        let history = TrackHistory::new(&path);
        history.record("a.mp3").await.unwrap();
        history.clear().await.unwrap();

        assert!(TrackHistory::load(&path).await.is_empty().await);
    }
}
