//! Burned-in title captions.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reel_models::{Canvas, EncodingConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{escape_drawtext, escape_filter_path};

/// Characters per caption line on a 1080 wide canvas.
pub const DEFAULT_WRAP_WIDTH: usize = 14;
/// Lines kept before the caption is truncated.
pub const DEFAULT_MAX_LINES: usize = 3;

/// Font files tried in order when none is configured.
pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "fonts/caption.otf",
    "fonts/caption.ttf",
    "/usr/share/fonts/truetype/nanum/NanumGothicBold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
];

/// Visual settings of the caption box.
#[derive(Debug, Clone)]
pub struct CaptionStyle {
    /// Font file; `None` leaves the choice to FFmpeg's default font
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    pub font_color: String,
    pub box_color: String,
    pub box_border: u32,
    /// Top of the safe zone in canvas pixels
    pub top_offset: u32,
    pub line_spacing: u32,
    pub wrap_width: usize,
    pub max_lines: usize,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: 80,
            font_color: "white".to_string(),
            box_color: "black@0.5".to_string(),
            box_border: 30,
            top_offset: 150,
            line_spacing: 12,
            wrap_width: DEFAULT_WRAP_WIDTH,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl CaptionStyle {
    pub fn with_font_file(mut self, font: Option<PathBuf>) -> Self {
        self.font_file = font;
        self
    }

    pub fn with_wrap_width(mut self, width: usize) -> Self {
        self.wrap_width = width.max(1);
        self
    }

    /// Scale the safe-zone offset for canvases other than 1920 tall.
    fn top_offset_for(&self, canvas: &Canvas) -> u32 {
        (self.top_offset as u64 * canvas.height as u64 / 1920) as u32
    }
}

/// First existing font among the candidates.
pub fn resolve_font<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

/// Drop control characters, turn `_` and `-` runs into spaces and collapse
/// whitespace.
pub fn normalize_caption_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word-wrap by character count. Words longer than `width` are split.
pub fn wrap_caption(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(width);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }

        let word_len = chars.len();
        if word_len == 0 {
            continue;
        }

        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars);
        current_len += word_len;
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Keep at most `max_lines` lines, marking truncation on the last one.
fn limit_lines(mut lines: Vec<String>, max_lines: usize) -> Vec<String> {
    if lines.len() > max_lines && max_lines > 0 {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push('…');
        }
    }
    lines
}

/// Prepare caption text for rendering: normalized, wrapped and truncated.
pub fn layout_caption(text: &str, style: &CaptionStyle) -> Vec<String> {
    let normalized = normalize_caption_text(text);
    limit_lines(wrap_caption(&normalized, style.wrap_width), style.max_lines)
}

/// Build the drawtext filter for already laid out lines.
pub fn caption_filter(lines: &[String], style: &CaptionStyle, canvas: &Canvas) -> String {
    let text = escape_drawtext(&lines.join("\n"));
    let mut filter = String::from("drawtext=");

    if let Some(font) = &style.font_file {
        filter.push_str(&format!(
            "fontfile={}:",
            escape_filter_path(&font.to_string_lossy())
        ));
    }

    filter.push_str(&format!(
        "text={text}:fontcolor={}:fontsize={}:line_spacing={}:\
         box=1:boxcolor={}:boxborderw={}:x=(w-text_w)/2:y={}",
        style.font_color,
        style.font_size,
        style.line_spacing,
        style.box_color,
        style.box_border,
        style.top_offset_for(canvas),
    ));
    filter
}

/// Burn the caption into the clip. Audio is copied unchanged.
pub async fn render_caption(
    input: &Path,
    output: &Path,
    text: &str,
    style: &CaptionStyle,
    canvas: &Canvas,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    let lines = layout_caption(text, style);
    if lines.is_empty() {
        return Err(MediaError::invalid_input("caption text is empty"));
    }

    let filter = caption_filter(&lines, style, canvas);
    debug!(filter = %filter, "Caption filter");
    info!(input = %input.display(), lines = lines.len(), "Rendering caption");

    let cmd = FfmpegCommand::new(input, output)
        .video_filter(filter)
        .map("0:v")
        .map("0:a?")
        .encode_video(encoding)
        .copy_audio()
        .faststart();

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}
