//! Shared data models for the Reelsmith shorts pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Raw assets handed over by a collector
//! - Media probes, audio profiles and canvas plans
//! - Audio mix topologies and specs
//! - Publish requests and receipts
//! - Encoding configuration

pub mod asset;
pub mod canvas;
pub mod encoding;
pub mod media;
pub mod mix;
pub mod publish;

pub use asset::{AssetId, AssetState, MediaKind, RawAsset};
pub use canvas::{Canvas, CanvasStrategy, TransformPlan};
pub use encoding::EncodingConfig;
pub use media::{AudioProfile, MediaProbe, DEFAULT_SILENCE_THRESHOLD_DB};
pub use mix::{MixInput, MixSource, MixSpec, MixTopology};
pub use publish::{PublishArtifact, PublishReceipt, PublishRequest, VideoMetadata};
