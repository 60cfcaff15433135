//! Title, description and tag enrichment.
//!
//! A remote Gemini call produces the metadata when configured. Any failure
//! falls back to metadata derived locally from the raw title, so enrichment
//! can never block or fail an asset.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use reel_models::VideoMetadata;

use crate::config::EnrichmentConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Maximum title length before truncation.
pub const MAX_TITLE_CHARS: usize = 90;
/// Maximum number of title-derived tags.
pub const MAX_TITLE_TAGS: usize = 10;
pub const TITLE_HASHTAGS: &str = "#shorts #이슈 #재미";
pub const BASE_TAGS: &[&str] = &["이슈", "숏츠", "개그"];
const SUBSCRIBE_LINE: &str = "영상이 재밌다면 구독과 좋아요 부탁드려요!";

static EXTENSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(gif|gifv|mp4|webm|avi|mov|mkv)(\s|$)").expect("valid extension pattern")
});
static BRACKET_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("valid bracket pattern"));
static NUMERIC_SUFFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+$").expect("valid suffix pattern"));
static SEPARATOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\-]+").expect("valid separator pattern"));
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣a-zA-Z0-9]+").expect("valid word pattern"));

/// Produces publish metadata for a raw title.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, raw_title: &str, source_url: Option<&str>) -> WorkerResult<VideoMetadata>;
}

/// Strip file extensions, bracket tags and numeric suffixes, turn separators
/// into spaces and cap the length.
pub fn clean_title(raw: &str) -> String {
    let title = EXTENSION_PATTERN.replace_all(raw, " ");
    let title = title.trim();
    let title = NUMERIC_SUFFIX_PATTERN.replace(title, "");
    let title = BRACKET_TAG_PATTERN.replace_all(&title, "");
    let title = SEPARATOR_PATTERN.replace_all(&title, " ");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if title.chars().count() > MAX_TITLE_CHARS {
        let mut truncated: String = title.chars().take(MAX_TITLE_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        title
    }
}

/// Base tags plus title words of at least two characters.
pub fn title_tags(clean_title: &str) -> Vec<String> {
    let mut tags: Vec<String> = BASE_TAGS.iter().map(|t| t.to_string()).collect();
    tags.extend(
        WORD_PATTERN
            .find_iter(clean_title)
            .map(|m| m.as_str())
            .filter(|w| w.chars().count() >= 2)
            .take(MAX_TITLE_TAGS)
            .map(str::to_string),
    );
    tags
}

/// Metadata derived from the raw title alone.
pub fn local_metadata(raw_title: &str, source_url: Option<&str>) -> VideoMetadata {
    let cleaned = clean_title(raw_title);
    let headline = if cleaned.is_empty() { "Shorts" } else { cleaned.as_str() };

    let mut description = format!("{headline}\n\n{SUBSCRIBE_LINE}\n");
    if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
        description.push_str(&format!("출처: {url}\n"));
    }

    VideoMetadata {
        title: format!("{headline} {TITLE_HASHTAGS}"),
        description,
        tags: title_tags(&cleaned),
        script: None,
    }
}

/// Enricher that never calls out.
#[derive(Debug, Clone, Default)]
pub struct LocalEnricher;

#[async_trait]
impl Enricher for LocalEnricher {
    async fn enrich(&self, raw_title: &str, source_url: Option<&str>) -> WorkerResult<VideoMetadata> {
        Ok(local_metadata(raw_title, source_url))
    }
}

/// Enrich, falling back to local metadata on any failure.
pub async fn enrich_or_fallback(
    enricher: &dyn Enricher,
    raw_title: &str,
    source_url: Option<&str>,
) -> VideoMetadata {
    match enricher.enrich(raw_title, source_url).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Enrichment failed, using local title: {}", e);
            metrics::record_enrichment_fallback();
            local_metadata(raw_title, source_url)
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EnrichedFields {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    script: Option<String>,
}

/// Gemini-backed enricher.
pub struct GeminiEnricher {
    config: EnrichmentConfig,
    client: Client,
    retry: RetryConfig,
}

impl GeminiEnricher {
    pub fn new(config: EnrichmentConfig) -> WorkerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(WorkerError::config_error("GEMINI_API_KEY is empty"));
        }
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config,
            client,
            retry: RetryConfig::new("gemini_enrichment"),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_prompt(&self, title: &str) -> String {
        format!(
            r#"You write metadata for a vertical short video.

Original title: "{title}"

Return ONLY a single JSON object with this schema:
{{
  "title": "Catchy title under 90 characters",
  "description": "Two or three engaging sentences",
  "tags": ["up to 10 short tags"],
  "script": "One spoken narration sentence of about ten seconds"
}}

Write in the language of the original title. Use a friendly, conversational tone."#
        )
    }

    async fn call_api(&self, prompt: &str) -> Result<EnrichedFields, EnrichmentCallError> {
        // The key travels in a header so it never shows up in a logged URL.
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                EnrichmentCallError::transient(format!("request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Gemini API returned {status}: {body}");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                EnrichmentCallError::transient(message)
            } else {
                EnrichmentCallError::permanent(message)
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentCallError::permanent(format!("bad response: {e}")))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| EnrichmentCallError::permanent("no content in response"))?;

        serde_json::from_str(strip_code_fence(text))
            .map_err(|e| EnrichmentCallError::permanent(format!("bad metadata JSON: {e}")))
    }
}

#[derive(Debug)]
struct EnrichmentCallError {
    message: String,
    transient: bool,
}

impl EnrichmentCallError {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl std::fmt::Display for EnrichmentCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[async_trait]
impl Enricher for GeminiEnricher {
    async fn enrich(&self, raw_title: &str, source_url: Option<&str>) -> WorkerResult<VideoMetadata> {
        let cleaned = clean_title(raw_title);
        let prompt = self.build_prompt(&cleaned);
        debug!(model = %self.config.model, "Requesting metadata enrichment");

        let fields = retry_async(&self.retry, |e: &EnrichmentCallError| e.transient, || {
            self.call_api(&prompt)
        })
        .await
        .map_err(|e| WorkerError::enrichment_failed(e.message))?;

        let title = clean_title(&fields.title);
        if title.is_empty() {
            return Err(WorkerError::enrichment_failed("enriched title is empty"));
        }

        // Credits and base tags are kept even when the model supplies its own.
        let local = local_metadata(raw_title, source_url);
        let mut description = fields.description.trim().to_string();
        if description.is_empty() {
            description = local.description;
        } else if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
            description.push_str(&format!("\n\n출처: {url}"));
        }

        let mut tags = local.tags;
        for tag in fields.tags {
            let tag = tag.trim().trim_start_matches('#').to_string();
            if !tag.is_empty() && !tags.contains(&tag) && tags.len() < BASE_TAGS.len() + MAX_TITLE_TAGS {
                tags.push(tag);
            }
        }

        info!(title = %title, "Metadata enriched");
        Ok(VideoMetadata {
            title,
            description,
            tags,
            script: fields.script.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }
}
