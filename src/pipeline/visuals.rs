//! Phase 2: visual regeneration.
//!
//! Runs as a full pass only after Phase 1 finishes for the whole deck, so
//! every slide's narration is final before any imagery is produced. Slides
//! are processed in order because each generated visual becomes the style
//! context for the next one (visual continuity across the deck).
//!
//! Target locales prefer cheaper paths: an already-generated translated
//! artifact is reused as-is; otherwise the source locale's artifact plus
//! the translated narration is handed to the designer for re-rendering;
//! only when both are unavailable does the slide fall through to full
//! regeneration from its raster.
//!
//! A slide with no producible visual increments the missing counter and the
//! pass continues — the counter only decides (in the orchestrator) whether
//! the visuals-augmented container is finalized at all.

use crate::capabilities::{Capabilities, Designer, SlidePosition};
use crate::config::RunConfig;
use crate::deck::Deck;
use crate::error::SlideError;
use crate::extract::SlideUnit;
use crate::pipeline::persist_bytes;
use crate::progress::Phase;
use crate::prompts;
use crate::retry::{Attempt, RetryPolicy};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a slide's visual must be produced (as opposed to reusing the
/// artifact already on disk).
pub fn should_generate_visual(artifact_exists: bool, force_retry: bool) -> bool {
    force_retry || !artifact_exists
}

/// Result of the visuals pass for one locale.
#[derive(Debug, Default)]
pub struct VisualsPhaseOutcome {
    /// Artifacts present on disk after the pass.
    pub written: usize,
    /// Slides with no producible visual.
    pub missing: usize,
    pub errors: Vec<SlideError>,
}

/// On-disk artifact path for one slide's regenerated visual.
pub fn artifact_path(config: &RunConfig, locale: &str, slide_index: usize) -> PathBuf {
    config
        .visuals_dir(locale)
        .join(format!("slide_{slide_index}_reimagined.png"))
}

/// Run Phase 2 over every slide unit, embedding each produced visual into
/// the visuals deck copy.
pub async fn run_visuals_phase(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
    units: &[SlideUnit],
    notes_by_slide: &BTreeMap<usize, String>,
    visuals_deck: &mut Deck,
) -> VisualsPhaseOutcome {
    if let Some(cb) = &config.progress_callback {
        cb.on_phase_start(Phase::Visuals);
    }

    let total = units.len();
    let policy = RetryPolicy::new(
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
        config.retry_backoff_multiplier,
    );

    let mut outcome = VisualsPhaseOutcome::default();
    // The previous slide's visual, threaded forward for continuity.
    let mut style_context: Option<Vec<u8>> = None;

    for unit in units {
        // Slides whose narration failed in Phase 1 are not given a visual;
        // they count as missing so the augmented container is withheld.
        let Some(narration) = notes_by_slide.get(&unit.index) else {
            outcome.missing += 1;
            outcome
                .errors
                .push(SlideError::VisualMissing { slide: unit.index });
            warn!("Slide {}: no narration, visual skipped", unit.index);
            if let Some(cb) = &config.progress_callback {
                cb.on_slide_complete(Phase::Visuals, unit.index, total, false);
            }
            continue;
        };
        let path = artifact_path(config, locale, unit.index);

        let mut artifact: Option<Vec<u8>> = None;

        if !should_generate_visual(path.is_file(), config.force_retry) {
            match std::fs::read(&path) {
                Ok(bytes) if image::load_from_memory(&bytes).is_ok() => {
                    debug!("Slide {}: reusing existing visual", unit.index);
                    artifact = Some(bytes);
                }
                Ok(_) => warn!("Slide {}: existing visual undecodable; regenerating", unit.index),
                Err(e) => warn!("Slide {}: existing visual unreadable ({e}); regenerating", unit.index),
            }
        }

        // Translation path for target locales: re-render the source visual
        // with localized text instead of regenerating from scratch.
        if artifact.is_none() && locale != config.source_locale() {
            let source_path = artifact_path(config, config.source_locale(), unit.index);
            if let Ok(source_visual) = std::fs::read(&source_path) {
                let prompt = prompts::visual_translation_prompt(narration, locale);
                artifact = design_with_retry(
                    &policy,
                    caps.designer.as_ref(),
                    vec![source_visual],
                    &prompt,
                    unit.index,
                )
                .await;
                if artifact.is_some() {
                    debug!("Slide {}: visual translated from source locale", unit.index);
                }
            }
        }

        // Full regeneration from the slide raster.
        if artifact.is_none() {
            let position = SlidePosition::from_index(unit.index, total);
            let prompt = prompts::designer_prompt(
                narration,
                position,
                &config.visual_style,
                locale,
                style_context.is_some(),
            );
            let mut images = vec![unit.raster.clone()];
            if let Some(ctx) = &style_context {
                images.push(ctx.clone());
            }
            artifact =
                design_with_retry(&policy, caps.designer.as_ref(), images, &prompt, unit.index)
                    .await;
        }

        match artifact {
            Some(bytes) => {
                if let Err(e) = persist_bytes(&path, &bytes) {
                    warn!("Slide {}: failed to persist visual ({e})", unit.index);
                }
                visuals_deck.replace_slide_with_picture(unit.index, bytes.clone());
                style_context = Some(bytes);
                outcome.written += 1;
                if let Some(cb) = &config.progress_callback {
                    cb.on_slide_complete(Phase::Visuals, unit.index, total, true);
                }
            }
            None => {
                outcome.missing += 1;
                outcome
                    .errors
                    .push(SlideError::VisualMissing { slide: unit.index });
                warn!("Slide {}: no visual artifact produced", unit.index);
                if let Some(cb) = &config.progress_callback {
                    cb.on_slide_complete(Phase::Visuals, unit.index, total, false);
                }
            }
        }
    }

    info!(
        "Visuals pass for {locale}: {} written, {} missing",
        outcome.written, outcome.missing
    );
    outcome
}

/// Drive the designer through the retry executor; a declined response
/// (`Ok(None)`) and undecodable bytes are both retryable empties.
async fn design_with_retry(
    policy: &RetryPolicy,
    designer: &dyn Designer,
    images: Vec<Vec<u8>>,
    prompt: &str,
    slide: usize,
) -> Option<Vec<u8>> {
    policy
        .run(|attempt| {
            let images = images.clone();
            async move {
                debug!("Slide {slide} design attempt {}", attempt + 1);
                match designer.design(&images, prompt).await {
                    Ok(Some(bytes)) if image::load_from_memory(&bytes).is_ok() => {
                        Attempt::Complete(bytes)
                    }
                    Ok(Some(_)) => {
                        warn!("Slide {slide}: designer returned undecodable bytes");
                        Attempt::Empty { partial: None }
                    }
                    Ok(None) => Attempt::Empty { partial: None },
                    Err(e) => Attempt::Failed {
                        detail: e.to_string(),
                        partial: None,
                    },
                }
            }
        })
        .await
        .into_result()
}
