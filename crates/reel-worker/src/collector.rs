//! Raw asset collection.
//!
//! Collectors hand the pipeline downloaded clips. Every collector consults
//! the ledger before touching a candidate, so known identifiers are never
//! downloaded or read again.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use reel_media::remove_if_exists;
use reel_models::{AssetId, MediaKind, RawAsset};
use reel_storage::AssetLedger;

use crate::error::{StageError, WorkerError, WorkerResult};

/// Files smaller than this are error pages or truncated transfers.
pub const MIN_DOWNLOAD_BYTES: u64 = 100;
/// Extensions the inbox collector admits.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "gif"];
const MAX_FILENAME_CHARS: usize = 50;

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    pub assets: Vec<RawAsset>,
    /// Candidates skipped because the ledger already holds them
    pub skipped: usize,
    /// Candidates whose download was unusable
    pub rejected: Vec<(AssetId, StageError)>,
}

/// Source of raw assets.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, ledger: &AssetLedger, limit: usize) -> WorkerResult<Collection>;
}

/// Keep letters, digits, underscores and spaces; spaces become underscores.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

/// Download file name for `id`: the sanitized id plus a hash of the raw id,
/// so ids that sanitize alike still get distinct files.
pub fn download_file_name(id: &str, ext: &str) -> String {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    format!("{}_{:08x}.{}", sanitize_filename(id), hasher.finish() as u32, ext)
}

/// Reject missing and undersized downloads.
pub async fn validate_download(path: &Path) -> Result<u64, StageError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| StageError::download(format!("{}: {}", path.display(), e)))?;

    if !metadata.is_file() {
        return Err(StageError::download(format!("{} is not a file", path.display())));
    }
    if metadata.len() < MIN_DOWNLOAD_BYTES {
        return Err(StageError::download(format!(
            "{} is only {} bytes",
            path.display(),
            metadata.len()
        )));
    }
    Ok(metadata.len())
}

fn media_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Optional `<stem>.json` next to an inbox clip.
#[derive(Debug, Deserialize)]
struct InboxSidecar {
    title: Option<String>,
    source_url: Option<String>,
}

/// Collects clips already downloaded into a directory.
///
/// The identifier is the file stem. Title and source URL come from an
/// optional JSON sidecar, otherwise the title is the stem.
pub struct InboxCollector {
    dir: PathBuf,
}

impl InboxCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_sidecar(path: &Path) -> Option<InboxSidecar> {
        let bytes = tokio::fs::read(path.with_extension("json")).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!(path = %path.display(), "Ignoring malformed sidecar: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Collector for InboxCollector {
    async fn collect(&self, ledger: &AssetLedger, limit: usize) -> WorkerResult<Collection> {
        let mut collection = Collection::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %self.dir.display(), "Inbox does not exist, nothing to collect");
                return Ok(collection);
            }
            Err(e) => return Err(e.into()),
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(ext) = media_extension(&path) {
                candidates.push((path, ext));
            }
        }
        candidates.sort();

        for (path, ext) in candidates {
            if collection.assets.len() >= limit {
                break;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let id = AssetId::new(stem);

            if ledger.has(&id).await {
                debug!(asset_id = %id, "Already in ledger, skipping");
                collection.skipped += 1;
                continue;
            }

            if let Err(e) = validate_download(&path).await {
                warn!(asset_id = %id, "Discarding unusable download: {}", e);
                let _ = remove_if_exists(&path).await;
                collection.rejected.push((id, e));
                continue;
            }

            let sidecar = Self::read_sidecar(&path).await;
            let title = sidecar
                .as_ref()
                .and_then(|s| s.title.clone())
                .unwrap_or_else(|| stem.to_string());
            let kind = MediaKind::from_extension(&ext).unwrap_or(MediaKind::Video);

            let mut asset = RawAsset::new(id, &path, title).with_kind(kind);
            if let Some(url) = sidecar.and_then(|s| s.source_url) {
                asset = asset.with_source_url(url);
            }
            collection.assets.push(asset);
        }

        info!(
            collected = collection.assets.len(),
            skipped = collection.skipped,
            rejected = collection.rejected.len(),
            "Inbox collection complete"
        );
        Ok(collection)
    }
}

/// Streams remote media to disk with a bounded timeout.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> WorkerResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Download `url` to `dest` and validate the result.
    ///
    /// On any failure the partial file is removed.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, StageError> {
        let result = self.fetch(url, dest).await;
        let result = match result {
            Ok(()) => validate_download(dest).await.map(|_| dest.to_path_buf()),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = remove_if_exists(dest).await;
        }
        result
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), StageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::download(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StageError::download(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::download(e.to_string()))?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| StageError::download(e.to_string()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StageError::download(format!("transfer failed: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StageError::download(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| StageError::download(e.to_string()))?;
        Ok(())
    }
}

/// A remote clip discovered by an external scraper.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCandidate {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl RemoteCandidate {
    fn extension(&self) -> String {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| MEDIA_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or_else(|| "mp4".to_string())
    }
}

/// Downloads a list of remote candidates, skipping known identifiers before
/// any request is made.
pub struct RemoteCollector {
    candidates: Vec<RemoteCandidate>,
    download_dir: PathBuf,
    downloader: HttpDownloader,
}

impl RemoteCollector {
    pub fn new(
        candidates: Vec<RemoteCandidate>,
        download_dir: impl Into<PathBuf>,
        downloader: HttpDownloader,
    ) -> Self {
        Self {
            candidates,
            download_dir: download_dir.into(),
            downloader,
        }
    }

    /// Load candidates from a JSON array file.
    pub async fn from_manifest(
        manifest: &Path,
        download_dir: impl Into<PathBuf>,
        downloader: HttpDownloader,
    ) -> WorkerResult<Self> {
        let bytes = tokio::fs::read(manifest).await.map_err(|e| {
            WorkerError::collection_failed(format!("{}: {}", manifest.display(), e))
        })?;
        let candidates: Vec<RemoteCandidate> = serde_json::from_slice(&bytes)?;
        Ok(Self::new(candidates, download_dir, downloader))
    }
}

#[async_trait]
impl Collector for RemoteCollector {
    async fn collect(&self, ledger: &AssetLedger, limit: usize) -> WorkerResult<Collection> {
        let mut collection = Collection::default();

        for candidate in &self.candidates {
            if collection.assets.len() >= limit {
                break;
            }

            let id = AssetId::new(candidate.id.clone());
            if ledger.has(&id).await {
                debug!(asset_id = %id, "Already in ledger, not downloading");
                collection.skipped += 1;
                continue;
            }

            let ext = candidate.extension();
            let dest = self.download_dir.join(download_file_name(id.as_str(), &ext));

            match self.downloader.download(&candidate.url, &dest).await {
                Ok(path) => {
                    let kind = MediaKind::from_extension(&ext).unwrap_or(MediaKind::Video);
                    let mut asset = RawAsset::new(id, path, candidate.title.clone()).with_kind(kind);
                    if let Some(url) = &candidate.source_url {
                        asset = asset.with_source_url(url.clone());
                    }
                    collection.assets.push(asset);
                }
                Err(e) => {
                    warn!(asset_id = %id, "Download rejected: {}", e);
                    collection.rejected.push((id, e));
                }
            }
        }

        info!(
            collected = collection.assets.len(),
            skipped = collection.skipped,
            rejected = collection.rejected.len(),
            "Remote collection complete"
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("funny cat!.mp4"), "funny_catmp4");
        assert_eq!(sanitize_filename("고양이 영상?"), "고양이_영상");
        assert_eq!(sanitize_filename("???"), "asset");
        assert_eq!(sanitize_filename(&"x".repeat(80)).chars().count(), 50);
    }

    #[tokio::test]
    async fn test_validate_download_rejects_tiny_files() {
        let dir = TempDir::new().unwrap();
        let tiny = dir.path().join("tiny.mp4");
        std::fs::write(&tiny, [0u8; 99]).unwrap();
        let ok = dir.path().join("ok.mp4");
        std::fs::write(&ok, [0u8; 100]).unwrap();

        assert!(matches!(validate_download(&tiny).await, Err(StageError::Download(_))));
        assert_eq!(validate_download(&ok).await.unwrap(), 100);
        assert!(validate_download(&dir.path().join("missing.mp4")).await.is_err());
    }

    #[tokio::test]
    async fn test_inbox_collects_and_skips_known() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a_clip.mp4"), [1u8; 500]).unwrap();
        std::fs::write(dir.path().join("b_seen.mp4"), [1u8; 500]).unwrap();
        std::fs::write(dir.path().join("c_tiny.gif"), [1u8; 10]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
        std::fs::write(
            dir.path().join("a_clip.json"),
            br#"{"title": "A clip", "source_url": "https://example.com/a"}"#,
        )
        .unwrap();

        let ledger = AssetLedger::new(dir.path().join("ledger.json"));
        ledger.mark_seen(&AssetId::new("b_seen")).await;

        let collection = InboxCollector::new(dir.path()).collect(&ledger, 10).await.unwrap();

        assert_eq!(collection.assets.len(), 1);
        let asset = &collection.assets[0];
        assert_eq!(asset.id.as_str(), "a_clip");
        assert_eq!(asset.title, "A clip");
        assert_eq!(asset.source_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(collection.skipped, 1);
        assert_eq!(collection.rejected.len(), 1);
        assert!(!dir.path().join("c_tiny.gif").exists());
        assert!(!ledger.has(&AssetId::new("c_tiny")).await);
    }

    #[tokio::test]
    async fn test_inbox_respects_limit_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            std::fs::write(dir.path().join(name), [1u8; 200]).unwrap();
        }
        let ledger = AssetLedger::new(dir.path().join("ledger.json"));

        let collection = InboxCollector::new(dir.path()).collect(&ledger, 2).await.unwrap();
        assert_eq!(collection.assets.len(), 2);

        let empty = InboxCollector::new(dir.path().join("missing"))
            .collect(&ledger, 2)
            .await
            .unwrap();
        assert!(empty.assets.is_empty());
    }

    fn candidate(server: &MockServer, id: &str, file: &str) -> RemoteCandidate {
        RemoteCandidate {
            id: id.to_string(),
            url: format!("{}/media/{}", server.uri(), file),
            title: format!("title {id}"),
            source_url: Some("https://example.com/post".to_string()),
        }
    }

    #[tokio::test]
    async fn test_remote_skips_known_without_downloading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/known.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 500]))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ledger = AssetLedger::new(dir.path().join("ledger.json"));
        ledger.mark_seen(&AssetId::new("known")).await;

        let collector = RemoteCollector::new(
            vec![candidate(&server, "known", "known.mp4")],
            dir.path(),
            HttpDownloader::new(Duration::from_secs(5)).unwrap(),
        );
        let collection = collector.collect(&ledger, 10).await.unwrap();

        assert!(collection.assets.is_empty());
        assert_eq!(collection.skipped, 1);
    }

    #[tokio::test]
    async fn test_remote_downloads_and_rejects_undersized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/good.webm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/tiny.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 50]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ledger = AssetLedger::new(dir.path().join("ledger.json"));
        let collector = RemoteCollector::new(
            vec![
                candidate(&server, "good", "good.webm"),
                candidate(&server, "tiny", "tiny.mp4"),
            ],
            dir.path(),
            HttpDownloader::new(Duration::from_secs(5)).unwrap(),
        );

        let collection = collector.collect(&ledger, 10).await.unwrap();

        assert_eq!(collection.assets.len(), 1);
        let good = &collection.assets[0];
        assert_eq!(good.path, dir.path().join(download_file_name("good", "webm")));
        assert_eq!(std::fs::metadata(&good.path).unwrap().len(), 4096);

        assert_eq!(collection.rejected.len(), 1);
        assert_eq!(collection.rejected[0].0.as_str(), "tiny");
        assert!(!dir.path().join(download_file_name("tiny", "mp4")).exists());
        assert!(!ledger.has(&AssetId::new("tiny")).await);
    }

    #[test]
    fn test_download_names_differ_for_similar_ids() {
        let a = download_file_name("post?1", "mp4");
        let b = download_file_name("post!1", "mp4");
        assert!(a.starts_with("post1_"));
        assert!(a.ends_with(".mp4"));
        assert_ne!(a, b);
        assert_eq!(a, download_file_name("post?1", "mp4"));
    }

    #[tokio::test]
    async fn test_remote_ids_that_sanitize_alike_keep_their_own_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/first.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 500]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/second.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 700]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ledger = AssetLedger::new(dir.path().join("ledger.json"));
        let collector = RemoteCollector::new(
            vec![
                candidate(&server, "post?1", "first.mp4"),
                candidate(&server, "post!1", "second.mp4"),
            ],
            dir.path(),
            HttpDownloader::new(Duration::from_secs(5)).unwrap(),
        );

        let collection = collector.collect(&ledger, 10).await.unwrap();

        assert_eq!(collection.assets.len(), 2);
        let first = &collection.assets[0];
        let second = &collection.assets[1];
        assert_ne!(first.path, second.path);
        assert_eq!(std::fs::read(&first.path).unwrap(), vec![1u8; 500]);
        assert_eq!(std::fs::read(&second.path).unwrap(), vec![2u8; 700]);
    }

    #[tokio::test]
    async fn test_http_error_status_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("x.mp4");
        let err = HttpDownloader::new(Duration::from_secs(5))
            .unwrap()
            .download(&format!("{}/media/x.mp4", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Download(_)));
        assert!(!dest.exists());
    }
}
