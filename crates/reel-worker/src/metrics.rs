//! Pipeline metrics.
//!
//! Counters are recorded through the `metrics` facade; the batch binary
//! installs no exporter, so they are free unless an embedding process does.

use metrics::counter;

use crate::error::PipelineStage;

/// Metric name constants for consistency.
pub mod names {
    /// Assets that entered the pipeline.
    pub const ASSETS_PROCESSED: &str = "reel_assets_processed_total";
    pub const ASSETS_PUBLISHED: &str = "reel_assets_published_total";
    /// Assets aborted by a structural failure, labelled by stage.
    pub const ASSETS_ABORTED: &str = "reel_assets_aborted_total";
    /// Assets skipped because the ledger already holds them.
    pub const ASSETS_SKIPPED: &str = "reel_assets_skipped_total";
    pub const PUBLISH_FAILURES: &str = "reel_publish_failures_total";
    /// Non-structural stage failures, labelled by stage.
    pub const STAGE_DEGRADATIONS: &str = "reel_stage_degradations_total";
    /// Enrichment calls answered by the local fallback.
    pub const ENRICHMENT_FALLBACKS: &str = "reel_enrichment_fallbacks_total";
}

pub fn record_processed() {
    counter!(names::ASSETS_PROCESSED).increment(1);
}

pub fn record_published() {
    counter!(names::ASSETS_PUBLISHED).increment(1);
}

pub fn record_aborted(stage: PipelineStage) {
    counter!(names::ASSETS_ABORTED, "stage" => stage.as_str()).increment(1);
}

pub fn record_skipped(count: u64) {
    counter!(names::ASSETS_SKIPPED).increment(count);
}

pub fn record_publish_failure() {
    counter!(names::PUBLISH_FAILURES).increment(1);
}

pub fn record_degradation(stage: PipelineStage) {
    counter!(names::STAGE_DEGRADATIONS, "stage" => stage.as_str()).increment(1);
}

pub fn record_enrichment_fallback() {
    counter!(names::ENRICHMENT_FALLBACKS).increment(1);
}
