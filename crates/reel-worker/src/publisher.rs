//! Hand-off of finished shorts to a publisher.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reel_media::remove_if_exists;
use reel_models::{PublishReceipt, PublishRequest};

use crate::collector::sanitize_filename;
use crate::error::StageError;

/// External publisher. The pipeline keeps its artifact until this returns.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, StageError>;
}

#[derive(Debug, Serialize)]
struct Sidecar<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    video: String,
    thumbnail: Option<String>,
    published_at: String,
}

/// Delivers shorts into an outbox directory with a JSON metadata sidecar.
///
/// Files are copied, so the pipeline's own copies stay under its cleanup.
pub struct DirectoryPublisher {
    outbox: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    /// First free `<base>`, `<base>_2`, ... in the outbox.
    async fn unique_base(&self, base: &str) -> PathBuf {
        let mut candidate = self.outbox.join(base);
        let mut n = 2;
        while tokio::fs::try_exists(candidate.with_extension("mp4")).await.unwrap_or(false) {
            candidate = self.outbox.join(format!("{base}_{n}"));
            n += 1;
        }
        candidate
    }

    /// Write the video, thumbnail and sidecar under `base`. Every path is
    /// pushed to `written` before it is touched.
    async fn deliver(
        &self,
        request: &PublishRequest,
        base: &Path,
        written: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, StageError> {
        let video = base.with_extension("mp4");
        written.push(video.clone());
        tokio::fs::copy(&request.artifact.video_path, &video)
            .await
            .map_err(|e| publish_error(&request.artifact.video_path, e))?;

        let thumbnail = match &request.artifact.thumbnail_path {
            Some(thumb) => {
                let dest = base.with_extension("jpg");
                written.push(dest.clone());
                tokio::fs::copy(thumb, &dest)
                    .await
                    .map_err(|e| publish_error(thumb, e))?;
                Some(dest)
            }
            None => None,
        };

        let sidecar = Sidecar {
            title: &request.metadata.title,
            description: &request.metadata.description,
            tags: &request.metadata.tags,
            video: video.to_string_lossy().to_string(),
            thumbnail: thumbnail.as_ref().map(|t| t.to_string_lossy().to_string()),
            published_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| StageError::publish(format!("sidecar: {e}")))?;
        let sidecar_path = base.with_extension("json");
        tokio::fs::write(&sidecar_path, json)
            .await
            .map_err(|e| publish_error(&sidecar_path, e))?;
        written.push(sidecar_path);

        Ok(video)
    }
}

fn publish_error(path: &Path, e: std::io::Error) -> StageError {
    StageError::publish(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, StageError> {
        tokio::fs::create_dir_all(&self.outbox)
            .await
            .map_err(|e| publish_error(&self.outbox, e))?;

        let base = self
            .unique_base(&sanitize_filename(&request.metadata.title))
            .await;

        // A partial delivery must not look like a published short.
        let mut written = Vec::new();
        let video = match self.deliver(request, &base, &mut written).await {
            Ok(video) => video,
            Err(e) => {
                for path in &written {
                    if let Err(err) = remove_if_exists(path).await {
                        warn!(path = %path.display(), "Failed to remove partial delivery: {}", err);
                    }
                }
                return Err(e);
            }
        };

        info!(video = %video.display(), "Short delivered to outbox");
        Ok(PublishReceipt {
            remote_id: video.to_string_lossy().to_string(),
            url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{PublishArtifact, VideoMetadata};
    use tempfile::TempDir;

    fn request(dir: &Path, with_thumb: bool) -> PublishRequest {
        let video = dir.join("final.mp4");
        std::fs::write(&video, [1u8; 256]).unwrap();
        let thumbnail_path = with_thumb.then(|| {
            let thumb = dir.join("thumb.jpg");
            std::fs::write(&thumb, [2u8; 64]).unwrap();
            thumb
        });

        PublishRequest {
            artifact: PublishArtifact {
                video_path: video,
                thumbnail_path,
            },
            metadata: VideoMetadata {
                title: "Cat plays piano #shorts".to_string(),
                description: "desc".to_string(),
                tags: vec!["cat".to_string()],
                script: None,
            },
        }
    }

    #[tokio::test]
    async fn test_publish_copies_artifact_and_writes_sidecar() {
        let work = TempDir::new().unwrap();
        let outbox = TempDir::new().unwrap();
        let publisher = DirectoryPublisher::new(outbox.path());

        let receipt = publisher.publish(&request(work.path(), true)).await.unwrap();

        let video = outbox.path().join("Cat_plays_piano_shorts.mp4");
        assert_eq!(receipt.remote_id, video.to_string_lossy());
        assert!(video.exists());
        assert!(outbox.path().join("Cat_plays_piano_shorts.jpg").exists());

        let sidecar: serde_json::Value = serde_json::from_slice(
            &std::fs::read(outbox.path().join("Cat_plays_piano_shorts.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(sidecar["title"], "Cat plays piano #shorts");
        assert_eq!(sidecar["tags"][0], "cat");

        // Source stays for the pipeline's cleanup.
        assert!(work.path().join("final.mp4").exists());
    }

    #[tokio::test]
    async fn test_publish_never_overwrites() {
        let work = TempDir::new().unwrap();
        let outbox = TempDir::new().unwrap();
        let publisher = DirectoryPublisher::new(outbox.path());

        let first = publisher.publish(&request(work.path(), false)).await.unwrap();
        let second = publisher.publish(&request(work.path(), false)).await.unwrap();

        assert_ne!(first.remote_id, second.remote_id);
        assert!(second.remote_id.ends_with("_2.mp4"));
    }

    fn outbox_files(outbox: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(outbox)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_thumbnail_copy_removes_video() {
        let work = TempDir::new().unwrap();
        let outbox = TempDir::new().unwrap();
        let mut req = request(work.path(), false);
        req.artifact.thumbnail_path = Some(work.path().join("missing.jpg"));

        let err = DirectoryPublisher::new(outbox.path())
            .publish(&req)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Publish(_)));
        assert!(outbox_files(outbox.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_sidecar_removes_copied_files() {
        let work = TempDir::new().unwrap();
        let outbox = TempDir::new().unwrap();
        // A directory squatting on the sidecar name makes the write fail.
        let blocker = outbox.path().join("Cat_plays_piano_shorts.json");
        std::fs::create_dir(&blocker).unwrap();

        let err = DirectoryPublisher::new(outbox.path())
            .publish(&request(work.path(), true))
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Publish(_)));
        assert_eq!(outbox_files(outbox.path()), vec![blocker]);
        assert!(work.path().join("final.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_video_is_publish_error() {
        let outbox = TempDir::new().unwrap();
        let mut req = request(outbox.path(), false);
        req.artifact.video_path = outbox.path().join("gone.mp4");

        let err = DirectoryPublisher::new(outbox.path().join("out"))
            .publish(&req)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Publish(_)));
    }
}
