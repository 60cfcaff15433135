//! Narration provider capability.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::NarrationResult;

/// A text-to-speech backend.
///
/// Providers write exactly one audio file to `output` or fail. They never
/// leave a partial file behind on failure.
#[async_trait]
pub trait NarrationProvider: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// File extension of the audio this provider produces.
    fn extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, output: &Path) -> NarrationResult<PathBuf>;
}
