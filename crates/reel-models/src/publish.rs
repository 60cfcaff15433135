//! Publish-side types exchanged with the external publisher.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Title, description and tags attached to a published short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Text spoken by the narration, when one is produced.
    #[serde(default)]
    pub script: Option<String>,
}

/// Terminal output of the pipeline for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishArtifact {
    pub video_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
}

/// Request handed to the publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub artifact: PublishArtifact,
    pub metadata: VideoMetadata,
}

/// Publisher acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Remote identifier or location of the published short.
    pub remote_id: String,
    #[serde(default)]
    pub url: Option<String>,
}
