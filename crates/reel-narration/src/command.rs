//! Offline text-to-speech through a local command (espeak-ng, piper, ...).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use reel_media::{check_command, remove_if_exists, run_process_with_input, verify_output};

use crate::error::{NarrationError, NarrationResult};
use crate::provider::NarrationProvider;

/// Placeholder replaced by the output file path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Placeholder replaced by the narration text. Without it the text goes to stdin.
pub const TEXT_PLACEHOLDER: &str = "{text}";

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Local TTS invocation.
#[derive(Debug, Clone)]
pub struct CommandTtsConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Extension of the produced audio
    pub extension: String,
    pub timeout: Duration,
}

impl CommandTtsConfig {
    /// `espeak-ng -w {output} {text}`
    pub fn espeak(voice: &str) -> Self {
        Self {
            program: "espeak-ng".to_string(),
            args: vec![
                "-v".to_string(),
                voice.to_string(),
                "-w".to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
                TEXT_PLACEHOLDER.to_string(),
            ],
            extension: "wav".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Parse a whitespace separated command line such as
    /// `piper --model ko.onnx --output_file {output}`.
    pub fn from_command_line(line: &str) -> NarrationResult<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| NarrationError::config("TTS command is empty"))?;
        let args: Vec<String> = parts.collect();

        if !args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(NarrationError::config(format!(
                "TTS command must contain {OUTPUT_PLACEHOLDER}"
            )));
        }

        Ok(Self {
            program,
            args,
            extension: "wav".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the text is passed as an argument rather than on stdin.
    fn text_in_args(&self) -> bool {
        self.args.iter().any(|a| a.contains(TEXT_PLACEHOLDER))
    }

    fn render_args(&self, text: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(OUTPUT_PLACEHOLDER, &output).replace(TEXT_PLACEHOLDER, text))
            .collect()
    }
}

/// Runs a local TTS binary with a bounded timeout.
pub struct CommandTtsProvider {
    config: CommandTtsConfig,
}

impl CommandTtsProvider {
    pub fn new(config: CommandTtsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NarrationProvider for CommandTtsProvider {
    fn name(&self) -> &str {
        &self.config.program
    }

    fn extension(&self) -> &str {
        &self.config.extension
    }

    async fn synthesize(&self, text: &str, output: &Path) -> NarrationResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(NarrationError::EmptyText);
        }
        check_command(&self.config.program)?;

        let args = self.config.render_args(text, output);
        debug!(program = %self.config.program, "Running local TTS");

        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let stdin = (!self.config.text_in_args()).then_some(text.as_bytes());
        let result = run_process_with_input(command, stdin, self.config.timeout).await;

        let outcome = match result {
            Ok(out) if out.status.success() => verify_output(output).await.map_err(NarrationError::from),
            Ok(out) => Err(NarrationError::command_failed(format!(
                "{} exited with {}: {}",
                self.config.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ))),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(bytes) => {
                info!(output = %output.display(), bytes, "Narration synthesized locally");
                Ok(output.to_path_buf())
            }
            Err(e) => {
                let _ = remove_if_exists(output).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_espeak_args() {
        let config = CommandTtsConfig::espeak("ko");
        let args = config.render_args("안녕하세요", Path::new("/tmp/n.wav"));
        assert_eq!(args, vec!["-v", "ko", "-w", "/tmp/n.wav", "안녕하세요"]);
        assert!(config.text_in_args());
    }

    #[test]
    fn test_command_line_with_stdin_text() {
        let config =
            CommandTtsConfig::from_command_line("piper --model ko.onnx --output_file {output}").unwrap();
        assert_eq!(config.program, "piper");
        assert!(!config.text_in_args());
        assert_eq!(
            config.render_args("hi", Path::new("out.wav")),
            vec!["--model", "ko.onnx", "--output_file", "out.wav"]
        );
    }

    #[test]
    fn test_command_line_requires_output() {
        assert!(CommandTtsConfig::from_command_line("say hello").is_err());
        assert!(CommandTtsConfig::from_command_line("   ").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let config = CommandTtsConfig::from_command_line("reel-no-such-tts {output}").unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("n.wav");
        let err = CommandTtsProvider::new(config).synthesize("hi", &out).await.unwrap_err();
        assert!(matches!(err, NarrationError::Media(_)));
        assert!(!out.exists());
    }
}
