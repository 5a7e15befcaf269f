//! Phase 1: narration.
//!
//! One full pass over the deck, strictly in slide order. For each slide the
//! state machine is:
//!
//! 1. **Replay** — a `success` ledger entry for this (slide, content-hash)
//!    replays its narration verbatim with zero capability calls (unless
//!    force-retry is set).
//! 2. **Translate** — on a target locale with a translator and a successful
//!    source-locale narration for the slide, translate instead of
//!    generating. Translation failure falls through silently.
//! 3. **Generate** — draft through the retry executor; an empty final
//!    attempt salvages the best partial output seen across attempts.
//!
//! Whatever the path, the final plain-text narration is written to every
//! editable deck copy and the ledger entry is persisted immediately
//! (write-through), so an interrupted run loses at most one slide.

use crate::capabilities::{Capabilities, DraftRequest, SlidePosition};
use crate::config::RunConfig;
use crate::deck::Deck;
use crate::error::SlideError;
use crate::extract::SlideUnit;
use crate::ledger::{slide_key, Ledger, NoteStatus, SlideEntry};
use crate::progress::Phase;
use crate::prompts;
use crate::retry::{Attempt, RetryOutcome, RetryPolicy};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Length of the rolling previous-slide summary carried between drafts.
const PREVIOUS_SUMMARY_CHARS: usize = 200;

/// Whether a slide needs (re)processing.
///
/// Only a `success` entry with non-empty narration is replayable; `error`
/// entries are always retried on the next run, and force-retry reprocesses
/// everything.
pub fn should_regenerate(entry: Option<&SlideEntry>, force_retry: bool) -> bool {
    if force_retry {
        return true;
    }
    !matches!(entry, Some(e) if e.status == NoteStatus::Success && !e.note.is_empty())
}

/// A target-locale entry whose narration still equals the source-locale
/// narration verbatim was never actually translated; it must go back
/// through the translate path instead of being replayed.
pub fn is_untranslated_copy(entry: Option<&SlideEntry>, source_note: Option<&String>) -> bool {
    matches!((entry, source_note), (Some(e), Some(src)) if e.note == *src)
}

/// Result of the notes pass for one locale.
#[derive(Debug, Default)]
pub struct NotesPhaseOutcome {
    /// Final narration per slide index, successful slides only.
    pub notes_by_slide: BTreeMap<usize, String>,
    pub errors: Vec<SlideError>,
}

impl NotesPhaseOutcome {
    pub fn success_count(&self) -> usize {
        self.notes_by_slide.len()
    }
}

/// Run Phase 1 over every slide unit.
///
/// `source_notes` is the source locale's successful-narration map (empty
/// when this *is* the source locale). Every deck in `decks` receives the
/// identical narration text.
#[allow(clippy::too_many_arguments)]
pub async fn run_notes_phase(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
    units: &[SlideUnit],
    decks: &mut [Deck],
    ledger: &mut Ledger,
    ledger_path: &Path,
    source_notes: &BTreeMap<usize, String>,
    global_context: &str,
) -> NotesPhaseOutcome {
    if let Some(cb) = &config.progress_callback {
        cb.on_phase_start(Phase::Notes);
    }

    let total = units.len();
    let mut outcome = NotesPhaseOutcome::default();
    // The first slide's draft has no predecessor to summarize.
    let mut previous_summary = String::from("Start of presentation.");

    for unit in units {
        let key = slide_key(unit.index, &unit.existing_notes);

        let replayable = !should_regenerate(ledger.get(&key), config.force_retry)
            && !(locale != config.source_locale()
                && is_untranslated_copy(ledger.get(&key), source_notes.get(&unit.index)));

        let note = if replayable {
            let note = ledger.get(&key).map(|e| e.note.clone()).unwrap_or_default();
            debug!("Slide {}/{total}: replayed from ledger", unit.index);
            Some(note)
        } else {
            match narrate_slide(
                config,
                caps,
                locale,
                unit,
                total,
                source_notes,
                global_context,
                &previous_summary,
            )
            .await
            {
                Ok(note) => Some(note),
                Err(err) => {
                    warn!("{err}");
                    outcome.errors.push(err);
                    None
                }
            }
        };

        let entry = SlideEntry {
            slide_index: unit.index,
            existing_notes_hash: unit.content_hash.clone(),
            original_notes: unit.existing_notes.clone(),
            note: note.clone().unwrap_or_default(),
            status: if note.is_some() {
                NoteStatus::Success
            } else {
                NoteStatus::Error
            },
        };
        ledger.put(key, entry);
        ledger.save(ledger_path);

        if let Some(text) = &note {
            for deck in decks.iter_mut() {
                deck.set_notes(unit.index, text);
            }
            previous_summary = text.chars().take(PREVIOUS_SUMMARY_CHARS).collect();
            outcome.notes_by_slide.insert(unit.index, text.clone());
        }

        if let Some(cb) = &config.progress_callback {
            cb.on_slide_complete(Phase::Notes, unit.index, total, note.is_some());
        }
    }

    info!(
        "Notes pass for {locale}: {}/{total} slides narrated",
        outcome.success_count()
    );
    outcome
}

/// Translate-or-generate for one slide (the non-replay path).
#[allow(clippy::too_many_arguments)]
async fn narrate_slide(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
    unit: &SlideUnit,
    total: usize,
    source_notes: &BTreeMap<usize, String>,
    global_context: &str,
    previous_summary: &str,
) -> Result<String, SlideError> {
    // Translation-first for target locales.
    if locale != config.source_locale() {
        if let (Some(translator), Some(source_note)) =
            (caps.translator.as_ref(), source_notes.get(&unit.index))
        {
            let prompt = prompts::translate_notes_prompt(source_note, locale);
            match translator
                .translate(&prompt, locale, config.source_locale())
                .await
            {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("Slide {}: translated from source locale", unit.index);
                    return Ok(text.trim().to_string());
                }
                Ok(_) => warn!(
                    "Slide {}: empty translation; falling back to generation",
                    unit.index
                ),
                Err(e) => warn!(
                    "Slide {}: translation failed ({e}); falling back to generation",
                    unit.index
                ),
            }
        }
    }

    // Advisory audit of pre-existing notes; never gates regeneration.
    let position = SlidePosition::from_index(unit.index, total);
    let verdict = if unit.existing_notes.trim().is_empty() {
        None
    } else {
        match caps.auditor.audit(&unit.existing_notes, position).await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Slide {}: audit unavailable ({e})", unit.index);
                None
            }
        }
    };

    let request = DraftRequest {
        slide_index: unit.index,
        raster: unit.raster.clone(),
        existing_notes: unit.existing_notes.clone(),
        existing_notes_verdict: verdict,
        previous_summary: previous_summary.to_string(),
        theme: config.theme.clone(),
        speaker_style: config.speaker_style.clone(),
        global_context: global_context.to_string(),
        position,
        locale: locale.to_string(),
    };

    let policy = RetryPolicy::new(
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
        config.retry_backoff_multiplier,
    );
    let outcome = policy
        .run(|attempt| {
            let request = request.clone();
            async move {
                debug!(
                    "Slide {} draft attempt {}",
                    request.slide_index,
                    attempt + 1
                );
                match caps.drafter.draft(&request).await {
                    Ok(reply) if !reply.text.trim().is_empty() => {
                        Attempt::Complete(reply.text.trim().to_string())
                    }
                    Ok(reply) => Attempt::Empty {
                        partial: reply.partial.filter(|p| !p.trim().is_empty()),
                    },
                    Err(e) => Attempt::Failed {
                        detail: e.to_string(),
                        partial: None,
                    },
                }
            }
        })
        .await;

    match outcome {
        RetryOutcome::Success(text) => Ok(text),
        RetryOutcome::Salvaged(text) => {
            warn!(
                "Slide {}: final attempt empty; salvaged partial draft",
                unit.index
            );
            Ok(text)
        }
        RetryOutcome::Exhausted(detail) => Err(SlideError::DraftFailed {
            slide: unit.index,
            attempts: config.max_retries,
            detail,
        }),
    }
}
