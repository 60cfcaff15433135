//! FFprobe media information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use reel_models::MediaProbe;

use crate::command::{check_ffprobe, run_process};
use crate::error::{MediaError, MediaResult};

/// Upper bound for a single ffprobe call.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a media file for dimensions, duration and audio presence.
///
/// Files without streams, without a video stream or with a non-positive
/// duration are reported as [`MediaError::InvalidMedia`].
pub async fn probe_media(path: impl AsRef<Path>, timeout: Duration) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let mut command = Command::new("ffprobe");
    command
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = run_process(command, timeout).await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Turn ffprobe JSON into a [`MediaProbe`].
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaProbe> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    if probe.streams.is_empty() {
        return Err(MediaError::invalid_media("no streams found"));
    }

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_media("no video stream found"))?;

    // Container duration first; GIFs and some webm files only carry it per stream.
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(video_stream.duration.as_deref()))
        .unwrap_or(0.0);

    if duration <= 0.0 {
        return Err(MediaError::invalid_media("zero duration"));
    }

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::invalid_media("video stream has no dimensions"));
    }

    Ok(MediaProbe {
        width,
        height,
        duration,
        has_audio_track: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
