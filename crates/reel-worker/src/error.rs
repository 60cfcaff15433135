//! Worker error types.

use std::fmt;
use thiserror::Error;

use reel_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("Collection failed: {0}")]
    CollectionFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] reel_storage::LedgerError),

    #[error("Narration error: {0}")]
    Narration(#[from] reel_narration::NarrationError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn enrichment_failed(msg: impl Into<String>) -> Self {
        Self::EnrichmentFailed(msg.into())
    }

    pub fn collection_failed(msg: impl Into<String>) -> Self {
        Self::CollectionFailed(msg.into())
    }
}

/// Pipeline stage an asset passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Download,
    Probe,
    Transform,
    Caption,
    Narration,
    Mix,
    Thumbnail,
    Publish,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Download => "download",
            PipelineStage::Probe => "probe",
            PipelineStage::Transform => "transform",
            PipelineStage::Caption => "caption",
            PipelineStage::Narration => "narration",
            PipelineStage::Mix => "mix",
            PipelineStage::Thumbnail => "thumbnail",
            PipelineStage::Publish => "publish",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single pipeline stage for one asset.
#[derive(Debug, Error)]
pub enum StageError {
    /// Missing, corrupt or undersized download. Not recorded; retried next run.
    #[error("download failed: {0}")]
    Download(String),

    #[error("probe failed: {0}")]
    Probe(#[source] MediaError),

    #[error("canvas normalization failed: {0}")]
    Transform(#[source] MediaError),

    #[error("caption rendering failed: {0}")]
    Caption(#[source] MediaError),

    #[error("all narration providers failed")]
    Narration,

    #[error("audio mix failed: {0}")]
    Mix(#[source] MediaError),

    #[error("thumbnail extraction failed: {0}")]
    Thumbnail(#[source] MediaError),

    #[error("publish failed: {0}")]
    Publish(String),
}

impl StageError {
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            StageError::Download(_) => PipelineStage::Download,
            StageError::Probe(_) => PipelineStage::Probe,
            StageError::Transform(_) => PipelineStage::Transform,
            StageError::Caption(_) => PipelineStage::Caption,
            StageError::Narration => PipelineStage::Narration,
            StageError::Mix(_) => PipelineStage::Mix,
            StageError::Thumbnail(_) => PipelineStage::Thumbnail,
            StageError::Publish(_) => PipelineStage::Publish,
        }
    }

    /// Structural failures abort the asset; the rest degrade.
    pub fn is_structural(&self) -> bool {
        matches!(self, StageError::Probe(_) | StageError::Transform(_))
    }

    /// The asset can never succeed, so it is recorded and skipped for good.
    ///
    /// Only defects of the file itself qualify. A missing tool or a timeout
    /// while probing leaves the asset eligible for another run.
    pub fn is_permanent(&self) -> bool {
        matches!(self, StageError::Probe(e) if e.is_media_defect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_probe_and_transform_are_structural() {
        let structural = [
            StageError::Probe(MediaError::invalid_media("zero duration")),
            StageError::Transform(MediaError::Timeout(300)),
        ];
        let degrading = [
            StageError::Caption(MediaError::Timeout(1)),
            StageError::Narration,
            StageError::Mix(MediaError::Timeout(1)),
            StageError::Thumbnail(MediaError::Timeout(1)),
        ];

        assert!(structural.iter().all(StageError::is_structural));
        assert!(!degrading.iter().any(StageError::is_structural));
        assert!(!StageError::publish("503").is_structural());
    }

    #[test]
    fn test_permanent_only_for_media_defects() {
        assert!(StageError::Probe(MediaError::invalid_media("no streams")).is_permanent());
        assert!(!StageError::Probe(MediaError::FfprobeNotFound).is_permanent());
        assert!(!StageError::Transform(MediaError::invalid_media("x")).is_permanent());
        assert!(!StageError::download("tiny file").is_permanent());
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(StageError::Narration.stage(), PipelineStage::Narration);
        assert_eq!(StageError::download("x").stage().to_string(), "download");
    }
}
