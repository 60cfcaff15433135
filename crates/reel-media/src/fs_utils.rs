//! Filesystem helpers for intermediate media files.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Verify that a tool produced a non-empty file. Returns its size.
pub async fn verify_output(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(MediaError::EmptyOutput(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::EmptyOutput(path.to_path_buf()))
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Delete a file, treating an already-missing file as success.
///
/// Returns `true` when a file was actually removed.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_verify_output_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.mp4");
        fs::write(&empty, b"").await.unwrap();

        assert!(matches!(
            verify_output(&empty).await,
            Err(MediaError::EmptyOutput(_))
        ));
        assert!(matches!(
            verify_output(dir.path().join("missing.mp4")).await,
            Err(MediaError::EmptyOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_output_returns_size() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("out.mp4");
        fs::write(&file, b"12345").await.unwrap();
        assert_eq!(verify_output(&file).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_remove_if_exists_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mp4");
        fs::write(&file, b"x").await.unwrap();

        assert!(remove_if_exists(&file).await.unwrap());
        assert!(!remove_if_exists(&file).await.unwrap());
    }
}
