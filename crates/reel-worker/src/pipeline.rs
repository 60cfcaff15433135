//! Per-asset pipeline orchestration.
//!
//! Sequences canvas normalization, captioning, audio analysis, narration,
//! mixing and thumbnail extraction for one asset, then hands the result to
//! the publisher. Probe and transform failures abort the asset; every other
//! stage failure carries the previous artifact forward. All files created
//! for the asset are deleted once it reaches a terminal outcome.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Instrument};

use reel_media::{
    apply_mix, build_mix_spec, extract_thumbnail, normalize_canvas, plan_canvas, probe_media,
    profile_audio, remove_if_exists, render_caption, resolve_font, topology_for, CaptionStyle,
    FfmpegRunner, MediaError, MediaResult, MixAssets,
};
use reel_models::{
    AssetId, AssetState, AudioProfile, Canvas, CanvasStrategy, EncodingConfig, MediaProbe,
    MixSource, MixSpec, MixTopology, PublishArtifact, PublishReceipt, PublishRequest, RawAsset,
    TransformPlan,
};
use reel_narration::{with_closing_phrase, NarrationChain};
use reel_storage::AssetLedger;

use crate::collector::sanitize_filename;
use crate::config::PipelineConfig;
use crate::enrichment::{clean_title, enrich_or_fallback, Enricher};
use crate::error::{PipelineStage, StageError};
use crate::logging::AssetLogger;
use crate::metrics;
use crate::music::MusicLibrary;
use crate::publisher::Publisher;

/// Media operations the orchestrator sequences.
#[async_trait]
pub trait MediaStages: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaProbe>;

    /// Returns `input` itself on passthrough.
    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        strategy: CanvasStrategy,
    ) -> MediaResult<PathBuf>;

    async fn caption(&self, input: &Path, output: &Path, text: &str) -> MediaResult<PathBuf>;

    /// Never fails; analysis problems leave the audio audible.
    async fn profile_audio(&self, path: &Path, probe: &MediaProbe) -> AudioProfile;

    /// Returns `video` itself for a passthrough topology.
    async fn mix(
        &self,
        video: &Path,
        output: &Path,
        spec: &MixSpec,
        narration: Option<&Path>,
        music: Option<&Path>,
        duration: f64,
    ) -> MediaResult<PathBuf>;

    async fn thumbnail(&self, video: &Path, output: &Path, duration: f64) -> MediaResult<PathBuf>;
}

/// [`MediaStages`] backed by the FFmpeg CLI.
pub struct FfmpegStages {
    runner: FfmpegRunner,
    probe_timeout: Duration,
    canvas: Canvas,
    encoding: EncodingConfig,
    caption_style: CaptionStyle,
    silence_threshold_db: f64,
}

impl FfmpegStages {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let font = resolve_font(&config.font_candidates);
        if font.is_none() {
            warn!("No caption font found, FFmpeg's default font will be used");
        }

        Self {
            runner: FfmpegRunner::new().with_timeout(config.ffmpeg_timeout),
            probe_timeout: config.probe_timeout,
            canvas: Canvas::vertical(),
            encoding: config.encoding.clone(),
            caption_style: CaptionStyle::default()
                .with_font_file(font)
                .with_wrap_width(config.caption_wrap_width),
            silence_threshold_db: config.silence_threshold_db,
        }
    }
}

#[async_trait]
impl MediaStages for FfmpegStages {
    async fn probe(&self, path: &Path) -> MediaResult<MediaProbe> {
        probe_media(path, self.probe_timeout).await
    }

    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        strategy: CanvasStrategy,
    ) -> MediaResult<PathBuf> {
        normalize_canvas(input, output, strategy, &self.canvas, &self.encoding, &self.runner).await
    }

    async fn caption(&self, input: &Path, output: &Path, text: &str) -> MediaResult<PathBuf> {
        render_caption(
            input,
            output,
            text,
            &self.caption_style,
            &self.canvas,
            &self.encoding,
            &self.runner,
        )
        .await
    }

    async fn profile_audio(&self, path: &Path, probe: &MediaProbe) -> AudioProfile {
        profile_audio(path, probe, self.silence_threshold_db, &self.runner).await
    }

    async fn mix(
        &self,
        video: &Path,
        output: &Path,
        spec: &MixSpec,
        narration: Option<&Path>,
        music: Option<&Path>,
        duration: f64,
    ) -> MediaResult<PathBuf> {
        let assets = MixAssets { narration, music };
        apply_mix(video, output, spec, assets, duration, &self.encoding, &self.runner).await
    }

    async fn thumbnail(&self, video: &Path, output: &Path, duration: f64) -> MediaResult<PathBuf> {
        extract_thumbnail(video, output, duration, &self.canvas, &self.runner).await
    }
}

/// Records every path created for an asset so it can be removed at the end.
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    paths: Vec<PathBuf>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    /// Stop tracking `path`; it survives cleanup.
    pub fn release(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked path. Missing files are fine.
    pub async fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..) {
            match remove_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove artifact: {}", e),
            }
        }
        removed
    }
}

/// Result of running one asset through the pipeline.
#[derive(Debug)]
pub struct AssetOutcome {
    pub id: AssetId,
    /// Last state reached: `CleanedUp` after a publish, `Aborted` after a
    /// structural failure, `ThumbnailExtracted` after a publish failure.
    pub state: AssetState,
    pub receipt: Option<PublishReceipt>,
    /// The failure that ended the run, if any
    pub error: Option<StageError>,
    /// Stages whose failure was absorbed
    pub degraded: Vec<PipelineStage>,
    /// Canvas plan, once the probe succeeded
    pub plan: Option<TransformPlan>,
    pub topology: Option<MixTopology>,
    /// Whether the identifier is now in the ledger
    pub recorded: bool,
    /// Files removed by cleanup
    pub removed_files: usize,
}

impl AssetOutcome {
    fn new(id: AssetId) -> Self {
        Self {
            id,
            state: AssetState::Downloaded,
            receipt: None,
            error: None,
            degraded: Vec::new(),
            plan: None,
            topology: None,
            recorded: false,
            removed_files: 0,
        }
    }

    pub fn is_published(&self) -> bool {
        self.receipt.is_some()
    }

    pub fn is_aborted(&self) -> bool {
        self.state == AssetState::Aborted
    }

    pub fn is_publish_failure(&self) -> bool {
        matches!(self.error, Some(StageError::Publish(_)))
    }

    pub fn strategy(&self) -> Option<CanvasStrategy> {
        self.plan.as_ref().map(|plan| plan.strategy)
    }
}

/// Runs assets through the pipeline, one at a time.
pub struct AssetPipeline {
    config: PipelineConfig,
    canvas: Canvas,
    stages: Arc<dyn MediaStages>,
    narration: NarrationChain,
    enricher: Arc<dyn Enricher>,
    publisher: Arc<dyn Publisher>,
    ledger: Arc<AssetLedger>,
    music: Option<Arc<MusicLibrary>>,
}

impl AssetPipeline {
    pub fn new(
        config: PipelineConfig,
        stages: Arc<dyn MediaStages>,
        narration: NarrationChain,
        enricher: Arc<dyn Enricher>,
        publisher: Arc<dyn Publisher>,
        ledger: Arc<AssetLedger>,
    ) -> Self {
        Self {
            config,
            canvas: Canvas::vertical(),
            stages,
            narration,
            enricher,
            publisher,
            ledger,
            music: None,
        }
    }

    /// Rotate background music through `library` instead of the fixed track.
    pub fn with_music_library(mut self, library: Arc<MusicLibrary>) -> Self {
        self.music = Some(library);
        self
    }

    pub fn ledger(&self) -> &AssetLedger {
        &self.ledger
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one asset to a terminal outcome and clean up after it.
    pub async fn process(&self, asset: &RawAsset) -> AssetOutcome {
        let logger = AssetLogger::new(&asset.id, "shorts");
        let span = logger.create_span();

        async {
            metrics::record_processed();
            logger.log_start(&asset.title);

            let mut outcome = AssetOutcome::new(asset.id.clone());
            let mut tracker = ArtifactTracker::new();
            tracker.track(&asset.path);

            let result = self.run_stages(asset, &logger, &mut tracker, &mut outcome).await;
            self.finish(asset, &logger, &mut tracker, &mut outcome, result).await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        asset: &RawAsset,
        logger: &AssetLogger,
        tracker: &mut ArtifactTracker,
        outcome: &mut AssetOutcome,
    ) -> Result<PublishReceipt, StageError> {
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| StageError::Transform(MediaError::Io(e)))?;

        let stem = sanitize_filename(asset.id.as_str());
        let work_file = |suffix: &str, ext: &str| {
            self.config.work_dir.join(format!("{stem}_{suffix}.{ext}"))
        };

        // Probe
        let probe = self.stages.probe(&asset.path).await.map_err(StageError::Probe)?;
        if !probe.duration.is_finite() || probe.duration <= 0.0 {
            return Err(StageError::Probe(MediaError::invalid_media(format!(
                "duration {} is not positive",
                probe.duration
            ))));
        }

        // Canvas
        let plan = TransformPlan {
            canvas: self.canvas,
            strategy: plan_canvas(&probe, asset.kind, &self.canvas, self.config.ratio_tolerance),
            caption_text: clean_title(&asset.title),
        };
        let canvas_out = work_file("canvas", "mp4");
        tracker.track(&canvas_out);
        let mut current = self
            .stages
            .normalize(&asset.path, &canvas_out, plan.strategy)
            .await
            .map_err(StageError::Transform)?;
        outcome.state = AssetState::Normalized;
        logger.log_progress(PipelineStage::Transform, plan.strategy.as_str());
        let caption_text = plan.caption_text.clone();
        outcome.plan = Some(plan);

        // Metadata never fails; it falls back to the local title.
        let mut metadata =
            enrich_or_fallback(self.enricher.as_ref(), &asset.title, asset.source_url.as_deref())
                .await;

        // Caption
        if caption_text.is_empty() {
            debug!("No caption text, skipping caption");
        } else {
            let out = work_file("caption", "mp4");
            tracker.track(&out);
            match self.stages.caption(&current, &out, &caption_text).await {
                Ok(path) => current = path,
                Err(e) => self.degrade(logger, outcome, StageError::Caption(e)),
            }
        }
        outcome.state = AssetState::Captioned;

        // Audio analysis
        let profile = self.stages.profile_audio(&current, &probe).await;
        outcome.state = AssetState::AudioAnalyzed;
        logger.log_progress(
            PipelineStage::Mix,
            &format!(
                "audio track={}, mean={:?} dB, silent={}",
                profile.has_audio_track, profile.mean_volume_db, profile.is_silent
            ),
        );

        // Narration
        let script = metadata
            .script
            .clone()
            .unwrap_or_else(|| caption_text.clone());
        let narration = if script.trim().is_empty() || self.narration.is_empty() {
            None
        } else {
            let text = with_closing_phrase(&script, &self.config.closing_phrase);
            let clip = self
                .narration
                .synthesize(&text, &self.config.work_dir, &format!("{stem}_narration"))
                .await;
            match &clip {
                Some(clip) => {
                    tracker.track(&clip.path);
                    metadata.script = Some(text);
                }
                None => self.degrade(logger, outcome, StageError::Narration),
            }
            clip
        };

        // Mix
        let rotated = match &self.music {
            Some(library) => library.pick().await,
            None => None,
        };
        let music = rotated
            .clone()
            .or_else(|| self.config.available_music().cloned());
        let topology = topology_for(&profile, narration.is_some(), music.is_some());
        outcome.topology = Some(topology);
        let spec = build_mix_spec(topology, &self.config.gains);
        if topology.requires_mix() {
            let out = work_file("mixed", "mp4");
            tracker.track(&out);
            let mixed = self
                .stages
                .mix(
                    &current,
                    &out,
                    &spec,
                    narration.as_ref().map(|n| n.path.as_path()),
                    music.as_deref(),
                    probe.duration,
                )
                .await;
            match mixed {
                Ok(path) => {
                    current = path;
                    if let (Some(library), Some(track)) = (&self.music, &rotated) {
                        if spec.uses(MixSource::BackgroundMusic) {
                            library.mark_used(track).await;
                        }
                    }
                }
                Err(e) => self.degrade(logger, outcome, StageError::Mix(e)),
            }
        }
        outcome.state = AssetState::Mixed;
        logger.log_progress(PipelineStage::Mix, topology.as_str());

        // Thumbnail
        let thumb_out = work_file("thumb", "jpg");
        tracker.track(&thumb_out);
        let thumbnail_path = match self.stages.thumbnail(&current, &thumb_out, probe.duration).await {
            Ok(path) => Some(path),
            Err(e) => {
                self.degrade(logger, outcome, StageError::Thumbnail(e));
                None
            }
        };
        outcome.state = AssetState::ThumbnailExtracted;

        // Publish
        let request = PublishRequest {
            artifact: PublishArtifact {
                video_path: current,
                thumbnail_path,
            },
            metadata,
        };
        let receipt = self.publisher.publish(&request).await?;
        outcome.state = AssetState::Published;
        Ok(receipt)
    }

    fn degrade(&self, logger: &AssetLogger, outcome: &mut AssetOutcome, error: StageError) {
        let stage = error.stage();
        logger.log_warning(stage, &error.to_string());
        metrics::record_degradation(stage);
        outcome.degraded.push(stage);
    }

    /// Settle the ledger and remove the asset's files.
    async fn finish(
        &self,
        asset: &RawAsset,
        logger: &AssetLogger,
        tracker: &mut ArtifactTracker,
        outcome: &mut AssetOutcome,
        result: Result<PublishReceipt, StageError>,
    ) {
        let record = match result {
            Ok(receipt) => {
                metrics::record_published();
                logger.log_completion(&format!("published as {}", receipt.remote_id));
                outcome.receipt = Some(receipt);
                true
            }
            Err(error) if error.is_structural() => {
                outcome.state = AssetState::Aborted;
                logger.log_error(error.stage(), &error.to_string());
                metrics::record_aborted(error.stage());
                let permanent = error.is_permanent();
                outcome.error = Some(error);
                permanent
            }
            Err(error) => {
                logger.log_error(error.stage(), &error.to_string());
                metrics::record_publish_failure();
                // Keep the download so the next run can retry it.
                tracker.release(&asset.path);
                outcome.error = Some(error);
                false
            }
        };

        if record {
            match self.ledger.record_terminal(&asset.id).await {
                Ok(_) => outcome.recorded = true,
                Err(e) => logger.log_error(PipelineStage::Publish, &format!("ledger update failed: {e}")),
            }
        }

        outcome.removed_files = tracker.cleanup().await;
        if outcome.state == AssetState::Published {
            outcome.state = outcome.state.next();
        }
        debug!(removed = outcome.removed_files, "Asset artifacts cleaned up");
    }
}
