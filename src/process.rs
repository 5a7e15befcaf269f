//! Top-level enrichment orchestration.
//!
//! [`enrich`] drives one run per locale, source locale first, so that every
//! target locale can translate from the source locale's completed ledger.
//! [`enrich_locale`] is the single-run entry point; it is also what a
//! resumable driver calls to redo one locale.
//!
//! Per run: open editable deck copies, pair slides with rasters, load the
//! ledger, acquire the GlobalContext, then Phase 1 (narration) → Phase 2
//! (visuals, skippable) → container serialization through the archive
//! preserver → Phase 3 (videos, optional). The notes-only container is
//! written on every run; the visuals-augmented container only when every
//! slide got a visual.

use crate::archive;
use crate::capabilities::Capabilities;
use crate::config::RunConfig;
use crate::deck::Deck;
use crate::error::SageError;
use crate::extract;
use crate::ledger::Ledger;
use crate::output::{LocaleOutput, RunStats};
use crate::pipeline::{context, notes, video, visuals};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Enrich the deck for every configured locale, in order.
///
/// The source locale (first entry) always runs first; its ledger is the
/// translation basis for the rest. A fatal error in any locale aborts the
/// remaining ones.
pub async fn enrich(
    config: &RunConfig,
    caps: &Capabilities,
) -> Result<Vec<LocaleOutput>, SageError> {
    let mut outputs = Vec::with_capacity(config.locales.len());
    for locale in &config.locales {
        outputs.push(enrich_locale(config, caps, locale).await?);
    }
    Ok(outputs)
}

/// Run the full pipeline for one (presentation, locale) pair.
pub async fn enrich_locale(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
) -> Result<LocaleOutput, SageError> {
    info!(
        "Enriching {} for locale {locale}",
        config.deck_path.display()
    );

    let deck = Deck::open(&config.deck_path)?;
    let units = extract::extract_units(&deck, &config.rasters_dir)?;
    let total = units.len();

    let output_dir = config.resolved_output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|e| SageError::OutputWriteFailed {
        path: output_dir.clone(),
        source: e,
    })?;

    let ledger_path = config.ledger_path(locale);
    let mut ledger = Ledger::load(&ledger_path);

    // The source locale's ledger doubles as the translation basis.
    let (source_notes, source_context) = if locale == config.source_locale() {
        (BTreeMap::new(), None)
    } else {
        let source_ledger = Ledger::load(&config.ledger_path(config.source_locale()));
        (
            source_ledger.successful_notes(),
            Some(source_ledger.global_context),
        )
    };

    if let Some(cb) = &config.progress_callback {
        cb.on_run_start(locale, total);
    }

    let global_context = context::acquire_global_context(
        config,
        caps,
        locale,
        &units,
        &mut ledger,
        &ledger_path,
        source_context.as_deref(),
    )
    .await;

    // Two editable copies: one stays notes-only, one receives visuals.
    let mut decks = vec![deck.clone()];
    if !config.skip_visuals {
        decks.push(deck);
    }

    let mut notes_outcome = notes::run_notes_phase(
        config,
        caps,
        locale,
        &units,
        &mut decks,
        &mut ledger,
        &ledger_path,
        &source_notes,
        &global_context,
    )
    .await;

    let notes_container = config.notes_output_path(locale);
    finalize_container(config, &decks[0], &notes_container, "notes")?;

    let mut stats = RunStats {
        success_slides: notes_outcome.success_count(),
        error_slides: total - notes_outcome.success_count(),
        ..RunStats::default()
    };
    let mut slide_errors = std::mem::take(&mut notes_outcome.errors);

    let mut visuals_container = None;
    if !config.skip_visuals {
        let mut visuals_deck = decks.pop().unwrap_or_else(|| decks[0].clone());
        let visuals_outcome = visuals::run_visuals_phase(
            config,
            caps,
            locale,
            &units,
            &notes_outcome.notes_by_slide,
            &mut visuals_deck,
        )
        .await;
        stats.visuals_written = visuals_outcome.written;
        stats.visuals_missing = visuals_outcome.missing;
        slide_errors.extend(visuals_outcome.errors);

        // All-or-nothing: the visuals container exists only when every
        // slide got a visual.
        if visuals_outcome.missing == 0 && total > 0 {
            visuals_deck.force_widescreen();
            let path = config.visuals_output_path(locale);
            finalize_container(config, &visuals_deck, &path, "visuals")?;
            visuals_container = Some(path);
        } else {
            warn!(
                "Visuals container for {locale} withheld: {} slide(s) missing a visual",
                visuals_outcome.missing
            );
        }
    }

    let mut videos = Vec::new();
    if config.generate_videos {
        let (artifacts, errors) =
            video::run_video_phase(config, caps, locale, &units, &notes_outcome.notes_by_slide)
                .await;
        videos = artifacts;
        slide_errors.extend(errors);
    }

    if let Some(cb) = &config.progress_callback {
        cb.on_run_complete(
            stats.success_slides,
            stats.error_slides,
            visuals_container.is_some(),
        );
    }
    info!(
        "Locale {locale} done: {} ok, {} failed, visuals {}",
        stats.success_slides,
        stats.error_slides,
        if visuals_container.is_some() { "written" } else { "withheld" }
    );

    Ok(LocaleOutput {
        locale: locale.to_string(),
        notes_container,
        visuals_container,
        videos,
        slide_errors,
        stats,
    })
}

/// Serialize a deck copy to an intermediate file, then move it to its final
/// path through the archive preserver (macro reinjection for `.pptm`).
fn finalize_container(
    config: &RunConfig,
    deck: &Deck,
    destination: &PathBuf,
    tag: &str,
) -> Result<(), SageError> {
    let intermediate = config.resolved_output_dir().join(format!(
        ".{}_{tag}_intermediate.{}",
        config.base_name(),
        config.output_extension()
    ));
    deck.save(&intermediate)?;
    archive::preserve(&config.deck_path, &intermediate, destination)
}
