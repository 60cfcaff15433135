//! Pipeline configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reel_media::caption::{DEFAULT_FONT_CANDIDATES, DEFAULT_WRAP_WIDTH};
use reel_media::MixGains;
use reel_models::canvas::DEFAULT_RATIO_TOLERANCE;
use reel_models::{EncodingConfig, DEFAULT_SILENCE_THRESHOLD_DB};

/// Default Gemini model used for metadata enrichment.
pub const DEFAULT_ENRICHMENT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENRICHMENT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Appended to every narration script.
pub const DEFAULT_CLOSING_PHRASE: &str = "구독과 좋아요 부탁드려요!";

/// Remote metadata enrichment settings.
#[derive(Clone)]
pub struct EnrichmentConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Remote TTS settings.
#[derive(Clone)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub voice: String,
    pub language: String,
    pub timeout: Duration,
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("voice", &self.voice)
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scratch directory for intermediate artifacts
    pub work_dir: PathBuf,
    pub ledger_path: PathBuf,
    /// Directory the inbox collector scans for downloaded clips
    pub inbox_dir: PathBuf,
    /// JSON list of remote candidates; when set it replaces the inbox
    pub manifest_path: Option<PathBuf>,
    /// Directory published shorts are delivered to
    pub outbox_dir: PathBuf,
    /// Background music track; used only when the file exists
    pub music_path: Option<PathBuf>,
    /// Rotating music library; takes precedence over `music_path` when it has tracks
    pub music_dir: Option<PathBuf>,
    /// Tracks already used from `music_dir`
    pub music_history_path: PathBuf,
    /// Caption fonts tried in order
    pub font_candidates: Vec<PathBuf>,
    pub silence_threshold_db: f64,
    pub ratio_tolerance: f64,
    pub caption_wrap_width: usize,
    pub gains: MixGains,
    pub encoding: EncodingConfig,
    pub ffmpeg_timeout: Duration,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub enrichment: Option<EnrichmentConfig>,
    pub tts: Option<TtsConfig>,
    /// Local TTS command line, e.g. `piper --model ko.onnx --output_file {output}`
    pub local_tts_command: Option<String>,
    /// Voice for the bundled espeak-ng fallback
    pub espeak_voice: String,
    pub closing_phrase: String,
    /// Maximum assets attempted per run
    pub max_assets: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data/work"),
            ledger_path: PathBuf::from("data/download_history.json"),
            inbox_dir: PathBuf::from("data/inbox"),
            manifest_path: None,
            outbox_dir: PathBuf::from("data/outbox"),
            music_path: Some(PathBuf::from("data/music/background.mp3")),
            music_dir: Some(PathBuf::from("data/music")),
            music_history_path: PathBuf::from("data/used_music.json"),
            font_candidates: DEFAULT_FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
            silence_threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
            ratio_tolerance: DEFAULT_RATIO_TOLERANCE,
            caption_wrap_width: DEFAULT_WRAP_WIDTH,
            gains: MixGains::default(),
            encoding: EncodingConfig::default(),
            ffmpeg_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            enrichment: None,
            tts: None,
            local_tts_command: None,
            espeak_voice: "ko".to_string(),
            closing_phrase: DEFAULT_CLOSING_PHRASE.to_string(),
            max_assets: 10,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(key).unwrap_or(default))
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut font_candidates = defaults.font_candidates.clone();
        if let Some(font) = env_string("REEL_FONT_PATH") {
            font_candidates.insert(0, PathBuf::from(font));
        }

        let gains = MixGains {
            original_with_music: env_parse("REEL_GAIN_ORIGINAL_WITH_MUSIC")
                .unwrap_or(defaults.gains.original_with_music),
            original_without_music: env_parse("REEL_GAIN_ORIGINAL")
                .unwrap_or(defaults.gains.original_without_music),
            narration: env_parse("REEL_GAIN_NARRATION").unwrap_or(defaults.gains.narration),
            music_under_original: env_parse("REEL_GAIN_MUSIC_UNDER_ORIGINAL")
                .unwrap_or(defaults.gains.music_under_original),
            music_under_narration: env_parse("REEL_GAIN_MUSIC_UNDER_NARRATION")
                .unwrap_or(defaults.gains.music_under_narration),
            music_alone: env_parse("REEL_GAIN_MUSIC_ALONE").unwrap_or(defaults.gains.music_alone),
        };

        let mut encoding = defaults.encoding.clone();
        if let Some(crf) = env_parse("REEL_VIDEO_CRF") {
            encoding = encoding.with_crf(crf);
        }
        if let Some(preset) = env_string("REEL_VIDEO_PRESET") {
            encoding.preset = preset;
        }

        let enrichment = env_string("GEMINI_API_KEY").map(|api_key| EnrichmentConfig {
            api_key,
            endpoint: env_string("REEL_ENRICH_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENRICHMENT_ENDPOINT.to_string()),
            model: env_string("REEL_ENRICH_MODEL")
                .unwrap_or_else(|| DEFAULT_ENRICHMENT_MODEL.to_string()),
            timeout: env_secs("REEL_ENRICH_TIMEOUT_SECS", 20),
        });

        let tts = env_string("REEL_TTS_ENDPOINT").map(|endpoint| TtsConfig {
            endpoint,
            api_key: env_string("REEL_TTS_API_KEY"),
            voice: env_string("REEL_TTS_VOICE").unwrap_or_else(|| "default".to_string()),
            language: env_string("REEL_TTS_LANGUAGE").unwrap_or_else(|| "ko".to_string()),
            timeout: env_secs("REEL_TTS_TIMEOUT_SECS", 30),
        });

        Self {
            work_dir: env_string("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ledger_path: env_string("REEL_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ledger_path),
            inbox_dir: env_string("REEL_INBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.inbox_dir),
            manifest_path: env_string("REEL_MANIFEST_PATH").map(PathBuf::from),
            outbox_dir: env_string("REEL_OUTBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.outbox_dir),
            music_path: env_string("REEL_BGM_PATH")
                .map(PathBuf::from)
                .or(defaults.music_path),
            music_dir: env_string("REEL_MUSIC_DIR")
                .map(PathBuf::from)
                .or(defaults.music_dir),
            music_history_path: env_string("REEL_MUSIC_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_history_path),
            font_candidates,
            silence_threshold_db: env_parse("REEL_SILENCE_THRESHOLD_DB")
                .unwrap_or(defaults.silence_threshold_db),
            ratio_tolerance: env_parse("REEL_RATIO_TOLERANCE").unwrap_or(defaults.ratio_tolerance),
            caption_wrap_width: env_parse("REEL_CAPTION_WRAP_WIDTH")
                .unwrap_or(defaults.caption_wrap_width),
            gains,
            encoding,
            ffmpeg_timeout: env_secs("REEL_FFMPEG_TIMEOUT_SECS", 300),
            probe_timeout: env_secs("REEL_PROBE_TIMEOUT_SECS", 30),
            download_timeout: env_secs("REEL_DOWNLOAD_TIMEOUT_SECS", 60),
            enrichment,
            tts,
            local_tts_command: env_string("REEL_LOCAL_TTS_COMMAND"),
            espeak_voice: env_string("REEL_ESPEAK_VOICE").unwrap_or(defaults.espeak_voice),
            closing_phrase: std::env::var("REEL_CLOSING_PHRASE").unwrap_or(defaults.closing_phrase),
            max_assets: env_parse("REEL_MAX_ASSETS").unwrap_or(defaults.max_assets),
        }
    }

    /// Background music path, if configured and present on disk.
    pub fn available_music(&self) -> Option<&PathBuf> {
        self.music_path.as_ref().filter(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.silence_threshold_db, -55.0);
        assert_eq!(config.caption_wrap_width, 14);
        assert_eq!(config.max_assets, 10);
        assert!(config.enrichment.is_none());
        assert!(!config.font_candidates.is_empty());
    }

    #[test]
    fn test_missing_music_is_unavailable() {
        let config = PipelineConfig {
            music_path: Some(PathBuf::from("/nonexistent/bgm.mp3")),
            ..Default::default()
        };
        assert!(config.available_music().is_none());
    }

    #[test]
    fn test_music_file_is_available() {
        let dir = tempfile::TempDir::new().unwrap();
        let music = dir.path().join("bgm.mp3");
        std::fs::write(&music, b"ID3").unwrap();

        let config = PipelineConfig {
            music_path: Some(music.clone()),
            ..Default::default()
        };
        assert_eq!(config.available_music(), Some(&music));
    }

    #[test]
    fn test_debug_output_hides_api_keys() {
        let config = PipelineConfig {
            enrichment: Some(EnrichmentConfig {
                api_key: "SECRET-GEMINI-KEY".to_string(),
                endpoint: DEFAULT_ENRICHMENT_ENDPOINT.to_string(),
                model: DEFAULT_ENRICHMENT_MODEL.to_string(),
                timeout: Duration::from_secs(20),
            }),
            tts: Some(TtsConfig {
                endpoint: "http://localhost:5002/tts".to_string(),
                api_key: Some("SECRET-TTS-KEY".to_string()),
                voice: "default".to_string(),
                language: "ko".to_string(),
                timeout: Duration::from_secs(30),
            }),
            ..Default::default()
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("SECRET-GEMINI-KEY"));
        assert!(!rendered.contains("SECRET-TTS-KEY"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains(DEFAULT_ENRICHMENT_MODEL));
    }
}
