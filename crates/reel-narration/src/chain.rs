//! Ordered fallback over narration providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::provider::NarrationProvider;

/// Counter of provider failures, labelled by provider.
pub const PROVIDER_FAILURES: &str = "reel_narration_provider_failures_total";

/// Audio produced by one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationClip {
    pub path: PathBuf,
    pub provider: String,
}

/// Append the closing phrase unless the script already ends with it.
pub fn with_closing_phrase(script: &str, phrase: &str) -> String {
    let script = script.trim();
    let phrase = phrase.trim();

    if phrase.is_empty() || script.ends_with(phrase) {
        return script.to_string();
    }
    if script.is_empty() {
        return phrase.to_string();
    }
    format!("{script} {phrase}")
}

/// Tries providers in order; the first success wins.
#[derive(Clone, Default)]
pub struct NarrationChain {
    providers: Vec<Arc<dyn NarrationProvider>>,
}

impl NarrationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn NarrationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Synthesize `text` into `out_dir`.
    ///
    /// Returns `None` when the text is empty or every provider failed. Each
    /// failure is logged and counted; none is propagated.
    pub async fn synthesize(&self, text: &str, out_dir: &Path, stem: &str) -> Option<NarrationClip> {
        if text.trim().is_empty() {
            return None;
        }

        for provider in &self.providers {
            let name = provider.name().to_string();
            let output = out_dir.join(format!("{stem}.{}", provider.extension()));

            match provider.synthesize(text, &output).await {
                Ok(path) => {
                    info!(provider = %name, path = %path.display(), "Narration ready");
                    return Some(NarrationClip { path, provider: name });
                }
                Err(e) => {
                    warn!(provider = %name, "Narration provider failed: {}", e);
                    metrics::counter!(PROVIDER_FAILURES, "provider" => name).increment(1);
                }
            }
        }

        warn!(providers = self.providers.len(), "All narration providers failed");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NarrationError, NarrationResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NarrationProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn synthesize(&self, _text: &str, _output: &Path) -> NarrationResult<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NarrationError::EmptyAudio)
        }
    }

    struct Writing;

    #[async_trait]
    impl NarrationProvider for Writing {
        fn name(&self) -> &str {
            "writing"
        }

        fn extension(&self) -> &str {
            "wav"
        }

        async fn synthesize(&self, _text: &str, output: &Path) -> NarrationResult<PathBuf> {
            tokio::fs::write(output, b"RIFF").await?;
            Ok(output.to_path_buf())
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let dir = TempDir::new().unwrap();
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let chain = NarrationChain::new()
            .with_provider(failing.clone())
            .with_provider(Arc::new(Writing));

        let clip = chain.synthesize("hello", dir.path(), "narration").await.unwrap();
        assert_eq!(clip.provider, "writing");
        assert_eq!(clip.path, dir.path().join("narration.wav"));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failures_yield_none() {
        let dir = TempDir::new().unwrap();
        let chain = NarrationChain::new().with_provider(Arc::new(Failing {
            calls: AtomicUsize::new(0),
        }));
        assert!(chain.synthesize("hello", dir.path(), "n").await.is_none());
        assert!(NarrationChain::new().synthesize("hello", dir.path(), "n").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_is_not_attempted() {
        let dir = TempDir::new().unwrap();
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let chain = NarrationChain::new().with_provider(failing.clone());
        assert!(chain.synthesize("  ", dir.path(), "n").await.is_none());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_closing_phrase() {
        assert_eq!(with_closing_phrase("Look at this", "Subscribe!"), "Look at this Subscribe!");
        assert_eq!(with_closing_phrase("Wow. Subscribe!", "Subscribe!"), "Wow. Subscribe!");
        assert_eq!(with_closing_phrase("Wow", ""), "Wow");
        assert_eq!(with_closing_phrase("", "Subscribe!"), "Subscribe!");
    }
}
