//! HTTP text-to-speech provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{NarrationError, NarrationResult};
use crate::provider::NarrationProvider;

/// Default request timeout for the TTS service.
pub const DEFAULT_TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of an HTTP TTS endpoint.
#[derive(Debug, Clone)]
pub struct HttpTtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub voice: String,
    pub language: String,
    pub timeout: Duration,
}

impl HttpTtsConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            voice: "default".to_string(),
            language: "ko".to_string(),
            timeout: DEFAULT_TTS_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    language: &'a str,
}

/// Posts the text as JSON and stores the binary audio response.
pub struct HttpTtsProvider {
    config: HttpTtsConfig,
    client: Client,
}

impl HttpTtsProvider {
    pub fn new(config: HttpTtsConfig) -> NarrationResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(NarrationError::config("TTS endpoint is empty"));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl NarrationProvider for HttpTtsProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize(&self, text: &str, output: &Path) -> NarrationResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(NarrationError::EmptyText);
        }

        debug!(endpoint = %self.config.endpoint, chars = text.chars().count(), "Requesting speech");

        let mut request = self.client.post(&self.config.endpoint).json(&SynthesisRequest {
            text,
            voice: &self.config.voice,
            language: &self.config.language,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(NarrationError::EmptyAudio);
        }

        tokio::fs::write(output, &audio).await?;
        info!(output = %output.display(), bytes = audio.len(), "Narration synthesized");
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> HttpTtsProvider {
        let config = HttpTtsConfig::new(format!("{}/v1/speech", server.uri()))
            .with_api_key(Some("secret".to_string()))
            .with_voice("narrator");
        HttpTtsProvider::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_writes_audio_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "text": "hello there",
                "voice": "narrator",
                "language": "ko"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 512]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("voice.mp3");
        let result = provider(&server).synthesize("hello there", &out).await.unwrap();

        assert_eq!(result, out);
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 512);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("voice.mp3");
        let err = provider(&server).synthesize("hi", &out).await.unwrap_err();

        assert!(matches!(err, NarrationError::Status { status: 503, .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("voice.mp3");
        let err = provider(&server).synthesize("hi", &out).await.unwrap_err();

        assert!(matches!(err, NarrationError::EmptyAudio));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let err = provider(&server)
            .synthesize("   ", &dir.path().join("voice.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, NarrationError::EmptyText));
    }

    #[test]
    fn test_rejects_blank_endpoint() {
        assert!(HttpTtsProvider::new(HttpTtsConfig::new(" ")).is_err());
    }
}
