//! Output canvas and composition strategy definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target vertical canvas width.
pub const CANVAS_WIDTH: u32 = 1080;
/// Target vertical canvas height.
pub const CANVAS_HEIGHT: u32 = 1920;
/// Default tolerance when comparing a source ratio against 9:16.
pub const DEFAULT_RATIO_TOLERANCE: f64 = 0.02;

/// Fixed output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::vertical()
    }
}

impl Canvas {
    /// The 1080x1920 (9:16) shorts canvas.
    pub const fn vertical() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }

    /// Width divided by height (0.5625 for 9:16).
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a source clip is composed onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasStrategy {
    /// Source already matches the canvas; no transcode.
    Passthrough,
    /// Landscape source over a blurred, cropped copy of itself.
    BlurPadLandscape,
    /// Scale to fit and fill the remainder with a solid color.
    LetterboxPad,
}

impl CanvasStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanvasStrategy::Passthrough => "passthrough",
            CanvasStrategy::BlurPadLandscape => "blur_pad_landscape",
            CanvasStrategy::LetterboxPad => "letterbox_pad",
        }
    }

    /// Whether applying this strategy requires re-encoding the video.
    pub fn requires_transcode(&self) -> bool {
        !matches!(self, CanvasStrategy::Passthrough)
    }
}

impl fmt::Display for CanvasStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-asset plan computed once from the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformPlan {
    pub canvas: Canvas,
    pub strategy: CanvasStrategy,
    pub caption_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_canvas_ratio() {
        let canvas = Canvas::vertical();
        assert!((canvas.ratio() - 0.5625).abs() < 1e-9);
        assert_eq!(canvas.to_string(), "1080x1920");
    }

    #[test]
    fn test_passthrough_needs_no_transcode() {
        assert!(!CanvasStrategy::Passthrough.requires_transcode());
        assert!(CanvasStrategy::BlurPadLandscape.requires_transcode());
        assert!(CanvasStrategy::LetterboxPad.requires_transcode());
    }
}
