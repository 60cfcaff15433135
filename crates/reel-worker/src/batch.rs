//! Batch runs: collect, then process each asset in turn.

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collector::Collector;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{AssetOutcome, AssetPipeline};

/// Tally of one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub run_id: String,
    /// Assets handed to the pipeline
    pub attempted: usize,
    pub published: usize,
    pub aborted: usize,
    /// Candidates already in the ledger
    pub skipped: usize,
    pub failed_publish: usize,
    /// Downloads rejected before processing
    pub download_failed: usize,
    /// Stage degradations summed over all assets
    pub degradations: usize,
}

impl BatchReport {
    fn tally(&mut self, outcome: &AssetOutcome) {
        self.degradations += outcome.degraded.len();
        if outcome.is_published() {
            self.published += 1;
        } else if outcome.is_aborted() {
            self.aborted += 1;
        } else if outcome.is_publish_failure() {
            self.failed_publish += 1;
        }
    }
}

/// Drives one collection pass through the pipeline.
///
/// Assets run one at a time; a failed asset never stops the batch.
pub struct BatchRunner {
    collector: Arc<dyn Collector>,
    pipeline: AssetPipeline,
}

impl BatchRunner {
    pub fn new(collector: Arc<dyn Collector>, pipeline: AssetPipeline) -> Self {
        Self {
            collector,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &AssetPipeline {
        &self.pipeline
    }

    /// Run one batch of at most `max_assets` assets.
    pub async fn run(&self) -> WorkerResult<BatchReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("batch", run_id = %run_id);

        async {
            let limit = self.pipeline.config().max_assets;
            let collection = self
                .collector
                .collect(self.pipeline.ledger(), limit)
                .await
                .map_err(|e| WorkerError::collection_failed(e.to_string()))?;

            let mut report = BatchReport {
                run_id: run_id.clone(),
                skipped: collection.skipped,
                download_failed: collection.rejected.len(),
                ..Default::default()
            };
            metrics::record_skipped(collection.skipped as u64);
            for (id, error) in &collection.rejected {
                warn!(asset_id = %id, "Download rejected: {}", error);
            }

            info!(assets = collection.assets.len(), limit, "Starting batch");
            for asset in &collection.assets {
                report.attempted += 1;
                let outcome = self.pipeline.process(asset).await;
                report.tally(&outcome);
            }

            info!(
                attempted = report.attempted,
                published = report.published,
                aborted = report.aborted,
                skipped = report.skipped,
                failed_publish = report.failed_publish,
                download_failed = report.download_failed,
                degradations = report.degradations,
                "Batch complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
