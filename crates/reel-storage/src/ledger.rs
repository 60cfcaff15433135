//! Asset ledger.
//!
//! A set of asset identifiers stored as a pretty-printed JSON array of
//! strings, replaced atomically on every persist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use reel_models::AssetId;

use crate::error::LedgerResult;
use crate::json_set::{load_set, write_set};

/// Durable set of processed asset identifiers.
#[derive(Debug)]
pub struct AssetLedger {
    path: PathBuf,
    entries: Mutex<BTreeSet<String>>,
}

impl AssetLedger {
    /// Empty, unpersisted ledger bound to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeSet::new()),
        }
    }

    /// Load the ledger from `path`.
    ///
    /// A missing file is an empty ledger. An unreadable or corrupt file is
    /// also treated as empty, with a warning; the next persist replaces it.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_set(&path).await;
        info!(path = %path.display(), entries = entries.len(), "Loaded asset ledger");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has(&self, id: &AssetId) -> bool {
        self.entries.lock().await.contains(id.as_str())
    }

    /// Add `id` in memory. Returns whether it was new.
    pub async fn mark_seen(&self, id: &AssetId) -> bool {
        self.entries.lock().await.insert(id.as_str().to_string())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Write the ledger atomically.
    pub async fn persist(&self) -> LedgerResult<()> {
        // Held across the write so concurrent persists cannot interleave.
        let entries = self.entries.lock().await;
        write_set(&self.path, &entries).await?;
        debug!(path = %self.path.display(), entries = entries.len(), "Persisted asset ledger");
        Ok(())
    }

    /// Record a terminal outcome: mark and persist.
    pub async fn record_terminal(&self, id: &AssetId) -> LedgerResult<bool> {
        let added = self.mark_seen(id).await;
        self.persist().await?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_set::temp_path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = AssetLedger::load(dir.path().join("history.json")).await;
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_mark_seen_reports_novelty() {
        let dir = TempDir::new().unwrap();
        let ledger = AssetLedger::new(dir.path().join("history.json"));
        let id = AssetId::new("abc");

        assert!(!ledger.has(&id).await);
        assert!(ledger.mark_seen(&id).await);
        assert!(!ledger.mark_seen(&id).await);
        assert!(ledger.has(&id).await);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let ledger = AssetLedger::new(&path);
        ledger.record_terminal(&AssetId::new("b")).await.unwrap();
        ledger.record_terminal(&AssetId::new("a")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!temp_path(&path).exists());

        let reloaded = AssetLedger::load(&path).await;
        assert!(reloaded.has(&AssetId::new("a")).await);
        assert!(reloaded.has(&AssetId::new("b")).await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_and_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, b"{not json").unwrap();

        let ledger = AssetLedger::load(&path).await;
        assert!(ledger.is_empty().await);

        ledger.record_terminal(&AssetId::new("x")).await.unwrap();
        let reloaded = AssetLedger::load(&path).await;
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_unpersisted_marks_are_not_durable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        let ledger = AssetLedger::new(&path);
        ledger.mark_seen(&AssetId::new("pending")).await;

        let reloaded = AssetLedger::load(&path).await;
        assert!(!reloaded.has(&AssetId::new("pending")).await);
    }
}
