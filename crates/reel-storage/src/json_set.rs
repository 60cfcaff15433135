//! String sets stored as pretty-printed JSON arrays.
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash mid-write leaves the previous file intact.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

/// Read a set from `path`. Missing, unreadable and corrupt files are empty.
pub(crate) async fn load_set(path: &Path) -> BTreeSet<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(path = %path.display(), "Set file is corrupt, starting empty: {}", e);
                BTreeSet::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No set file yet, starting empty");
            BTreeSet::new()
        }
        Err(e) => {
            warn!(path = %path.display(), "Set file is unreadable, starting empty: {}", e);
            BTreeSet::new()
        }
    }
}

/// Write `entries` to `path` atomically.
pub(crate) async fn write_set(path: &Path, entries: &BTreeSet<String>) -> LedgerResult<()> {
    let ids: Vec<&String> = entries.iter().collect();
    let json = serde_json::to_vec_pretty(&ids)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LedgerError::write(parent, e))?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| LedgerError::write(&tmp, e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(LedgerError::replace(path, e));
    }
    Ok(())
}

/// Sibling temp file, so the final rename stays on one filesystem.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("ledger"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("/data/history.json"));
        assert_eq!(tmp, PathBuf::from("/data/history.json.tmp"));
    }

    #[tokio::test]
    async fn test_write_then_load_sorted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("set.json");
        let set: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();

        write_set(&path, &set).await.unwrap();

        let raw: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["a", "b"]);
        assert_eq!(load_set(&path).await, set);
        assert!(!temp_path(&path).exists());
    }
}
