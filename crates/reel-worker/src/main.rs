//! Shorts batch worker binary.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe};
use reel_narration::{
    CommandTtsConfig, CommandTtsProvider, HttpTtsConfig, HttpTtsProvider, NarrationChain,
};
use reel_storage::{AssetLedger, TrackHistory};
use reel_worker::{
    AssetPipeline, BatchRunner, Collector, DirectoryPublisher, Enricher, FfmpegStages,
    GeminiEnricher, HttpDownloader, InboxCollector, LocalEnricher, MusicLibrary, PipelineConfig,
    RemoteCollector,
};

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel=info".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Remote TTS first when configured, then a local command, then espeak.
fn narration_chain(config: &PipelineConfig) -> NarrationChain {
    let mut chain = NarrationChain::new();

    if let Some(tts) = &config.tts {
        let http = HttpTtsConfig::new(tts.endpoint.clone())
            .with_api_key(tts.api_key.clone())
            .with_voice(tts.voice.clone())
            .with_language(tts.language.clone())
            .with_timeout(tts.timeout);
        match HttpTtsProvider::new(http) {
            Ok(provider) => chain = chain.with_provider(Arc::new(provider)),
            Err(e) => warn!("Remote TTS disabled: {}", e),
        }
    }

    if let Some(line) = &config.local_tts_command {
        match CommandTtsConfig::from_command_line(line) {
            Ok(command) => chain = chain.with_provider(Arc::new(CommandTtsProvider::new(command))),
            Err(e) => warn!("Local TTS command ignored: {}", e),
        }
    }

    chain.with_provider(Arc::new(CommandTtsProvider::new(CommandTtsConfig::espeak(
        &config.espeak_voice,
    ))))
}

fn enricher(config: &PipelineConfig) -> Arc<dyn Enricher> {
    match &config.enrichment {
        Some(enrichment) => match GeminiEnricher::new(enrichment.clone()) {
            Ok(gemini) => return Arc::new(gemini),
            Err(e) => warn!("Gemini enrichment disabled: {}", e),
        },
        None => info!("GEMINI_API_KEY not set, using local metadata"),
    }
    Arc::new(LocalEnricher)
}

async fn collector(config: &PipelineConfig) -> anyhow::Result<Arc<dyn Collector>> {
    match &config.manifest_path {
        Some(manifest) => {
            let downloader = HttpDownloader::new(config.download_timeout)?;
            let remote =
                RemoteCollector::from_manifest(manifest, config.work_dir.join("downloads"), downloader)
                    .await
                    .with_context(|| format!("loading manifest {}", manifest.display()))?;
            Ok(Arc::new(remote))
        }
        None => Ok(Arc::new(InboxCollector::new(config.inbox_dir.clone()))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting reel-worker");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    let ledger = Arc::new(AssetLedger::load(&config.ledger_path).await);
    info!(entries = ledger.len().await, "Ledger loaded");

    let stages = Arc::new(FfmpegStages::from_config(&config));
    let publisher = Arc::new(DirectoryPublisher::new(config.outbox_dir.clone()));
    let collector = collector(&config).await?;
    let mut pipeline = AssetPipeline::new(
        config.clone(),
        stages,
        narration_chain(&config),
        enricher(&config),
        publisher,
        ledger,
    );
    if let Some(dir) = &config.music_dir {
        let history = TrackHistory::load(&config.music_history_path).await;
        info!(dir = %dir.display(), used = history.len().await, "Music library enabled");
        pipeline = pipeline.with_music_library(Arc::new(MusicLibrary::new(dir.clone(), history)));
    }

    let report = BatchRunner::new(collector, pipeline)
        .run()
        .await
        .context("batch run failed")?;

    info!(
        run_id = %report.run_id,
        published = report.published,
        attempted = report.attempted,
        "Worker finished"
    );
    Ok(())
}
