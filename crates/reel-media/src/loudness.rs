//! Audio presence and loudness analysis.

use std::path::Path;
use tracing::{debug, warn};

use reel_models::{AudioProfile, MediaProbe};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Run `volumedetect` over the whole audio stream and return the mean volume.
///
/// `Ok(None)` means the tool ran but reported no parseable mean volume.
pub async fn analyze_loudness(
    path: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<Option<f64>> {
    let path = path.as_ref();

    // volumedetect reports at info level.
    let cmd = FfmpegCommand::null_output(path)
        .output_arg("-vn")
        .audio_filter("volumedetect")
        .log_level("info");

    let output = runner.run(&cmd).await?;
    let mean = parse_mean_volume(&output.stderr);

    debug!(path = %path.display(), mean_volume_db = ?mean, "Loudness analysis complete");
    Ok(mean)
}

/// Extract `mean_volume: -20.3 dB` from volumedetect output.
pub fn parse_mean_volume(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let (_, rest) = line.split_once("mean_volume:")?;
        let value = rest.split_whitespace().next()?;
        value.parse::<f64>().ok()
    })
}

/// Build the audio profile of a clip.
///
/// Clips without an audio track skip analysis. Analysis failures leave the
/// original audio audible rather than muting it.
pub async fn profile_audio(
    path: impl AsRef<Path>,
    probe: &MediaProbe,
    threshold_db: f64,
    runner: &FfmpegRunner,
) -> AudioProfile {
    let path = path.as_ref();

    if !probe.has_audio_track {
        return AudioProfile::no_audio();
    }

    let mean = match analyze_loudness(path, runner).await {
        Ok(mean) => mean,
        Err(e) => {
            warn!(path = %path.display(), "Loudness analysis failed, treating audio as audible: {}", e);
            None
        }
    };

    AudioProfile::new(true, mean, threshold_db)
}
