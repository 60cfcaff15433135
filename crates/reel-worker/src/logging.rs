//! Structured per-asset logging.

use tracing::{error, info, warn, Span};

use reel_models::AssetId;

use crate::error::PipelineStage;

/// Logger carrying the asset identifier on every line.
#[derive(Debug, Clone)]
pub struct AssetLogger {
    asset_id: String,
    operation: String,
}

impl AssetLogger {
    pub fn new(asset_id: &AssetId, operation: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            asset_id = %self.asset_id,
            operation = %self.operation,
            "Asset started: {}", message
        );
    }

    pub fn log_progress(&self, stage: PipelineStage, message: &str) {
        info!(
            asset_id = %self.asset_id,
            stage = stage.as_str(),
            "Asset progress: {}", message
        );
    }

    /// A stage failed and the asset continues without its output.
    pub fn log_warning(&self, stage: PipelineStage, message: &str) {
        warn!(
            asset_id = %self.asset_id,
            stage = stage.as_str(),
            "Asset degraded: {}", message
        );
    }

    pub fn log_error(&self, stage: PipelineStage, message: &str) {
        error!(
            asset_id = %self.asset_id,
            stage = stage.as_str(),
            "Asset failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            asset_id = %self.asset_id,
            operation = %self.operation,
            "Asset completed: {}", message
        );
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the asset's whole pipeline run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "asset",
            asset_id = %self.asset_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_logger_creation() {
        let logger = AssetLogger::new(&AssetId::new("clip-42"), "shorts");
        assert_eq!(logger.asset_id(), "clip-42");
        assert_eq!(logger.operation(), "shorts");
    }
}
