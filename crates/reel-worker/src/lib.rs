//! Shorts batch worker.
//!
//! This crate provides:
//! - Collectors that feed raw clips past the dedup ledger
//! - The per-asset pipeline: canvas, caption, narration, mix, thumbnail
//! - Metadata enrichment with a local fallback
//! - Background music rotation
//! - Publishing and post-run cleanup

pub mod batch;
pub mod collector;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod music;
pub mod pipeline;
pub mod publisher;
pub mod retry;

pub use batch::{BatchReport, BatchRunner};
pub use collector::{
    download_file_name, sanitize_filename, validate_download, Collection, Collector,
    HttpDownloader, InboxCollector, RemoteCandidate, RemoteCollector,
};
pub use config::{EnrichmentConfig, PipelineConfig, TtsConfig};
pub use enrichment::{
    clean_title, enrich_or_fallback, local_metadata, Enricher, GeminiEnricher, LocalEnricher,
};
pub use error::{PipelineStage, StageError, WorkerError, WorkerResult};
pub use logging::AssetLogger;
pub use music::MusicLibrary;
pub use pipeline::{ArtifactTracker, AssetOutcome, AssetPipeline, FfmpegStages, MediaStages};
pub use publisher::{DirectoryPublisher, Publisher};
pub use retry::{retry_async, RetryConfig};
