//! Canvas normalization.
//!
//! Every clip leaves this stage as a frame of exactly the target canvas:
//! - sources already matching the canvas pass through untouched,
//! - landscape sources sit over a blurred, cropped copy of themselves,
//! - everything else is scaled to fit and padded with a solid color.
//!
//! The original audio track is copied unchanged.

use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::{Canvas, CanvasStrategy, EncodingConfig, MediaKind, MediaProbe};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Box blur applied to the background layer (luma radius : power).
const BACKGROUND_BLUR: &str = "boxblur=20:10";
/// Default fill for letterbox padding.
pub const DEFAULT_PAD_COLOR: &str = "black";
/// Output pad label of the canvas graph.
const VIDEO_OUT: &str = "[vout]";

/// Choose the composition strategy for a probed clip.
///
/// Passthrough requires the 9:16 ratio within `tolerance` and exactly the
/// canvas resolution, so the canvas size holds for every output. Animated
/// images always need a transcode into a video container.
pub fn plan_canvas(
    probe: &MediaProbe,
    kind: MediaKind,
    canvas: &Canvas,
    tolerance: f64,
) -> CanvasStrategy {
    let ratio = probe.aspect_ratio();
    let ratio_matches = (ratio - canvas.ratio()).abs() < tolerance;
    let size_matches = probe.width == canvas.width && probe.height == canvas.height;

    if kind == MediaKind::Video && ratio_matches && size_matches {
        CanvasStrategy::Passthrough
    } else if ratio > 1.0 {
        CanvasStrategy::BlurPadLandscape
    } else {
        CanvasStrategy::LetterboxPad
    }
}

/// Build the filter graph for a strategy. Passthrough has none.
///
/// Both graphs end in an exact `canvas` sized frame on the `[vout]` pad.
pub fn canvas_filter(strategy: CanvasStrategy, canvas: &Canvas, pad_color: &str) -> Option<String> {
    let (w, h) = (canvas.width, canvas.height);

    match strategy {
        CanvasStrategy::Passthrough => None,
        CanvasStrategy::BlurPadLandscape => Some(format!(
            "[0:v]split=2[src_bg][src_fg];\
             [src_bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},{BACKGROUND_BLUR}[bg];\
             [src_fg]scale={w}:{h}:force_original_aspect_ratio=decrease[fg];\
             [bg][fg]overlay=(W-w)/2:(H-h)/2,setsar=1{VIDEO_OUT}"
        )),
        CanvasStrategy::LetterboxPad => Some(format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={pad_color},setsar=1{VIDEO_OUT}"
        )),
    }
}

/// Normalize a clip onto the canvas.
///
/// Returns `input` itself on passthrough (no transcode), otherwise `output`.
pub async fn normalize_canvas(
    input: &Path,
    output: &Path,
    strategy: CanvasStrategy,
    canvas: &Canvas,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    let Some(graph) = canvas_filter(strategy, canvas, DEFAULT_PAD_COLOR) else {
        info!(input = %input.display(), "Clip already matches {}, skipping transcode", canvas);
        return Ok(input.to_path_buf());
    };

    if input == output {
        return Err(MediaError::invalid_input("canvas output must differ from input"));
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        strategy = %strategy,
        "Normalizing clip to {}", canvas
    );

    let cmd = FfmpegCommand::new(input, output)
        .filter_complex(graph)
        .map(VIDEO_OUT)
        .map("0:a?")
        .encode_video(encoding)
        .copy_audio()
        .faststart();

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::canvas::DEFAULT_RATIO_TOLERANCE;

    fn probe(width: u32, height: u32) -> MediaProbe {
        MediaProbe {
            width,
            height,
            duration: 10.0,
            has_audio_track: true,
        }
    }

    fn plan(width: u32, height: u32, kind: MediaKind) -> CanvasStrategy {
        plan_canvas(&probe(width, height), kind, &Canvas::vertical(), DEFAULT_RATIO_TOLERANCE)
    }

    #[test]
    fn test_matching_video_passes_through() {
        assert_eq!(plan(1080, 1920, MediaKind::Video), CanvasStrategy::Passthrough);
    }

    #[test]
    fn test_matching_gif_is_transcoded() {
        assert_eq!(plan(1080, 1920, MediaKind::AnimatedImage), CanvasStrategy::LetterboxPad);
    }

    #[test]
    fn test_landscape_blur_pads() {
        assert_eq!(plan(1920, 1080, MediaKind::Video), CanvasStrategy::BlurPadLandscape);
        assert_eq!(plan(640, 360, MediaKind::AnimatedImage), CanvasStrategy::BlurPadLandscape);
    }

    #[test]
    fn test_square_and_small_portrait_letterbox() {
        assert_eq!(plan(1080, 1080, MediaKind::Video), CanvasStrategy::LetterboxPad);
        assert_eq!(plan(720, 1280, MediaKind::Video), CanvasStrategy::LetterboxPad);
        assert_eq!(plan(1080, 1350, MediaKind::Video), CanvasStrategy::LetterboxPad);
    }

    #[test]
    fn test_every_graph_ends_on_exact_canvas() {
        let canvas = Canvas::vertical();
        for (w, h) in [(1920, 1080), (1080, 1080), (720, 1280), (3840, 2160), (200, 900)] {
            let strategy = plan(w, h, MediaKind::Video);
            let graph = canvas_filter(strategy, &canvas, DEFAULT_PAD_COLOR).unwrap();
            let last_chain = graph.rsplit(';').next().unwrap();
            match strategy {
                CanvasStrategy::BlurPadLandscape => {
                    assert!(graph.contains("crop=1080:1920"));
                    assert!(last_chain.starts_with("[bg][fg]overlay"));
                }
                CanvasStrategy::LetterboxPad => {
                    assert!(last_chain.contains("pad=1080:1920"));
                }
                CanvasStrategy::Passthrough => unreachable!(),
            }
            assert!(graph.ends_with("[vout]"));
        }
    }

    #[test]
    fn test_passthrough_has_no_graph() {
        assert!(canvas_filter(CanvasStrategy::Passthrough, &Canvas::vertical(), "black").is_none());
    }

    #[tokio::test]
    async fn test_passthrough_returns_input_without_running_tool() {
        let input = Path::new("/nonexistent/in.mp4");
        let result = normalize_canvas(
            input,
            Path::new("/nonexistent/out.mp4"),
            CanvasStrategy::Passthrough,
            &Canvas::vertical(),
            &EncodingConfig::default(),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap();
        assert_eq!(result, input);
    }
}
