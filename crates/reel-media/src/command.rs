//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use reel_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::verify_output;

/// Upper bound for a single local FFmpeg pass. Clips are seconds long, so
/// anything slower than this is a hung process.
pub const DEFAULT_FFMPEG_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of stderr lines kept in failure errors.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
struct FfmpegInput {
    path: PathBuf,
    /// Arguments placed before this input's -i
    args: Vec<String>,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    /// Output file path; `None` discards output (`-f null -`)
    output: Option<PathBuf>,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                path: input.as_ref().to_path_buf(),
                args: Vec::new(),
            }],
            output: Some(output.as_ref().to_path_buf()),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create an analysis command whose output is discarded.
    pub fn null_output(input: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new(input, "-");
        cmd.output = None;
        cmd
    }

    /// Add another input file. Subsequent `input_arg` calls apply to it.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            path: path.as_ref().to_path_buf(),
            args: Vec::new(),
        });
        self
    }

    /// Add an argument before the most recently added input's -i.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(input) = self.inputs.last_mut() {
            input.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Add output arguments (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before the latest input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Loop the latest input indefinitely.
    pub fn stream_loop(self) -> Self {
        self.input_arg("-stream_loop").input_arg("-1")
    }

    /// Bound the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Select a stream or filter pad for the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Copy the video stream without re-encoding.
    pub fn copy_video(self) -> Self {
        self.output_arg("-c:v").output_arg("copy")
    }

    /// Copy the audio stream without re-encoding.
    pub fn copy_audio(self) -> Self {
        self.output_arg("-c:a").output_arg("copy")
    }

    /// Drop all audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Encode video with the given settings.
    pub fn encode_video(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.video_args())
    }

    /// Encode audio with the given settings.
    pub fn encode_audio(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.audio_args())
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output file, if the command writes one.
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        match &self.output {
            Some(output) => args.push(output.to_string_lossy().to_string()),
            None => {
                args.push("-f".to_string());
                args.push("null".to_string());
                args.push("-".to_string());
            }
        }

        args
    }
}

/// Captured diagnostics of a finished FFmpeg run.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOutput {
    pub stderr: String,
}

/// Runner for FFmpeg commands with a bounded timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    timeout: Duration,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_FFMPEG_TIMEOUT,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run an FFmpeg command.
    ///
    /// Fails on a non-zero exit status, and when the command writes a file,
    /// on a missing or zero-byte output.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<FfmpegOutput> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut command = Command::new("ffmpeg");
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = run_process(command, self.timeout).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail(&stderr)),
                output.status.code(),
            ));
        }

        if let Some(path) = cmd.output_path() {
            verify_output(path).await?;
        }

        Ok(FfmpegOutput { stderr })
    }
}

/// Run a prepared process to completion, killing it once `timeout` expires.
pub async fn run_process(command: Command, timeout: Duration) -> MediaResult<Output> {
    run_process_with_input(command, None, timeout).await
}

/// Like [`run_process`], feeding `input` to the child's stdin first.
pub async fn run_process_with_input(
    mut command: Command,
    input: Option<&[u8]>,
    timeout: Duration,
) -> MediaResult<Output> {
    command.kill_on_drop(true);
    if input.is_some() {
        command.stdin(Stdio::piped());
    }
    let mut child = command.spawn()?;
    let stdin = child.stdin.take();

    let run = async move {
        if let (Some(mut stdin), Some(bytes)) = (stdin, input) {
            stdin.write_all(bytes).await?;
            // Closing stdin signals end of input.
            drop(stdin);
        }
        child.wait_with_output().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            // Dropping the wait future drops the child, which kills it.
            warn!("Process timed out after {} seconds, killing it", timeout.as_secs());
            Err(MediaError::Timeout(timeout.as_secs()))
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check if an arbitrary command is available.
pub fn check_command(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::CommandNotFound(program.to_string()))
}
