//! Phase 3: optional video synthesis.
//!
//! For each slide with a final narration, a short video prompt is derived
//! from it and persisted alongside the narration in a text file (always —
//! the prompt file is the durable artifact even when generation fails;
//! the obtained reference is appended once synthesis completes). The synthesizer is then invoked
//! with the prompt and the slide raster; asynchronous jobs are polled at a
//! fixed interval, bounded by a poll count rather than a wall-clock
//! deadline. The artifact reference comes back embedded in free text and is
//! extracted by pattern matching: an explicit identifier token first, a
//! filename-like token as fallback.
//!
//! Every failure here is logged and recorded; the phase never aborts.

use crate::capabilities::{Capabilities, VideoSynthesizer};
use crate::config::RunConfig;
use crate::error::SlideError;
use crate::extract::SlideUnit;
use crate::output::VideoArtifact;
use crate::progress::Phase;
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Explicit artifact identifiers, e.g. `files/abc-123` or `videos/xyz`.
static ARTIFACT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:files|videos)/[A-Za-z0-9_-]+").unwrap());

/// Filename-like fallback: anything ending in a video extension.
static VIDEO_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w./-]+\.(?:mp4|mov|webm)\b").unwrap());

/// Extract an artifact reference from a free-text synthesizer response.
pub fn extract_artifact_reference(text: &str) -> Option<String> {
    if let Some(m) = ARTIFACT_ID_RE.find(text) {
        return Some(m.as_str().to_string());
    }
    VIDEO_FILE_RE.find(text).map(|m| m.as_str().to_string())
}

/// Run Phase 3 over every slide unit.
///
/// Returns one [`VideoArtifact`] per narrated slide (the prompt file is
/// always written) plus the non-fatal failures encountered.
pub async fn run_video_phase(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
    units: &[SlideUnit],
    notes_by_slide: &BTreeMap<usize, String>,
) -> (Vec<VideoArtifact>, Vec<SlideError>) {
    let Some(synth) = caps.video.as_ref() else {
        warn!("Video generation requested but no synthesizer is configured; skipping Phase 3");
        return (Vec::new(), Vec::new());
    };

    if let Some(cb) = &config.progress_callback {
        cb.on_phase_start(Phase::Video);
    }

    let total = units.len();
    let videos_dir = config.videos_dir(locale);
    let mut artifacts = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for unit in units {
        // Only slides with a final narration get a video.
        let Some(narration) = notes_by_slide.get(&unit.index) else {
            debug!("Slide {}: no narration, video skipped", unit.index);
            continue;
        };
        let prompt = prompts::video_prompt(narration);

        let prompt_path = videos_dir.join(format!("slide_{}_video_prompt.txt", unit.index));
        let mut prompt_record = format!("{prompt}\n\nSpeaker Notes:\n{narration}\n");
        if let Err(e) = std::fs::create_dir_all(&videos_dir)
            .and_then(|_| std::fs::write(&prompt_path, &prompt_record))
        {
            warn!("Slide {}: failed to write video prompt ({e})", unit.index);
        }

        let reference = match synthesize(synth.as_ref(), config, &prompt, &unit.raster).await {
            Ok(reference) => reference,
            Err(detail) => {
                warn!("Slide {}: video generation failed: {detail}", unit.index);
                errors.push(SlideError::VideoFailed {
                    slide: unit.index,
                    detail,
                });
                None
            }
        };

        // The obtained reference is appended to the prompt file so the
        // directory is a self-contained record of the pass.
        if let Some(reference) = &reference {
            prompt_record.push_str(&format!("\nGenerated Video: {reference}\n"));
            if let Err(e) = std::fs::write(&prompt_path, &prompt_record) {
                warn!("Slide {}: failed to update video prompt ({e})", unit.index);
            }
        }

        if let Some(cb) = &config.progress_callback {
            cb.on_slide_complete(Phase::Video, unit.index, total, reference.is_some());
        }
        artifacts.push(VideoArtifact {
            slide_index: unit.index,
            prompt_path,
            reference,
        });
    }

    info!(
        "Video pass for {locale}: {}/{total} references obtained",
        artifacts.iter().filter(|a| a.reference.is_some()).count()
    );
    (artifacts, errors)
}

/// One generate call plus bounded fixed-interval polling.
async fn synthesize(
    synth: &dyn VideoSynthesizer,
    config: &RunConfig,
    prompt: &str,
    raster: &[u8],
) -> Result<Option<String>, String> {
    let response = synth
        .generate(prompt, raster)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(reference) = extract_artifact_reference(&response.text) {
        return Ok(Some(reference));
    }

    let Some(job) = response.pending_job else {
        return Ok(None);
    };

    let interval = Duration::from_millis(config.video_poll_interval_ms);
    for poll in 1..=config.video_max_polls {
        sleep(interval).await;
        debug!("Polling video job {job} ({poll}/{})", config.video_max_polls);
        match synth.poll(&job).await {
            Ok(Some(text)) => {
                return Ok(extract_artifact_reference(&text).or(Some(text)));
            }
            Ok(None) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    Err(format!(
        "job {job} incomplete after {} polls",
        config.video_max_polls
    ))
}
