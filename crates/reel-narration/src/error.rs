//! Narration error types.

use thiserror::Error;

/// Result type for narration operations.
pub type NarrationResult<T> = Result<T, NarrationError>;

/// Errors a single narration provider can report.
#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("Narration text is empty")]
    EmptyText,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS produced no audio")]
    EmptyAudio,

    #[error("TTS command failed: {0}")]
    CommandFailed(String),

    #[error("Invalid provider configuration: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NarrationError {
    pub fn command_failed(msg: impl Into<String>) -> Self {
        Self::CommandFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
