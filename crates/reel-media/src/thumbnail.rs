//! Thumbnail extraction.

use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::encoding::THUMBNAIL_JPEG_QUALITY;
use reel_models::Canvas;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Preferred frame offset, in seconds.
pub const PREFERRED_THUMBNAIL_OFFSET: f64 = 2.5;
/// Fraction of the duration used for clips shorter than the preferred offset.
pub const SHORT_CLIP_FRACTION: f64 = 0.3;

/// Timestamp of the representative frame: early, but never past the end.
pub fn thumbnail_timestamp(duration: f64) -> f64 {
    PREFERRED_THUMBNAIL_OFFSET.min(duration * SHORT_CLIP_FRACTION)
}

/// Extract one frame as a JPEG covering the canvas.
pub async fn extract_thumbnail(
    video: &Path,
    output: &Path,
    duration: f64,
    canvas: &Canvas,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(MediaError::invalid_input(format!(
            "cannot take a thumbnail of a clip lasting {duration}s"
        )));
    }

    let timestamp = thumbnail_timestamp(duration);
    info!(video = %video.display(), timestamp, "Extracting thumbnail");

    let (w, h) = (canvas.width, canvas.height);
    let cmd = FfmpegCommand::new(video, output)
        .seek(timestamp)
        .video_filter(format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"
        ))
        .single_frame()
        .output_args(["-q:v".to_string(), THUMBNAIL_JPEG_QUALITY.to_string()]);

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}
