#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the shorts pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with bounded runtimes
//! - Media probing and loudness analysis
//! - Canvas normalization onto the vertical frame
//! - Caption rendering with layered filter escaping
//! - Topology-driven audio mixing
//! - Thumbnail extraction

pub mod canvas;
pub mod caption;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod loudness;
pub mod mix;
pub mod probe;
pub mod thumbnail;

pub use canvas::{canvas_filter, normalize_canvas, plan_canvas};
pub use caption::{layout_caption, render_caption, resolve_font, CaptionStyle};
pub use command::{
    check_command, check_ffmpeg, check_ffprobe, run_process, run_process_with_input, FfmpegCommand,
    FfmpegRunner,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{remove_if_exists, verify_output};
pub use loudness::{analyze_loudness, profile_audio};
pub use mix::{apply_mix, build_mix_spec, mix_filter, select_topology, topology_for, MixAssets, MixGains};
pub use probe::{probe_media, DEFAULT_PROBE_TIMEOUT};
pub use thumbnail::{extract_thumbnail, thumbnail_timestamp};
