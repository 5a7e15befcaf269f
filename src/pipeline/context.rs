//! GlobalContext acquisition.
//!
//! The GlobalContext is a narrative summary of the whole deck (story,
//! audience, speaker persona) included in every drafting request. It is
//! computed at most once per (presentation, locale): the ledger caches it,
//! and target locales prefer translating the source locale's cached context
//! over re-analyzing the deck.

use crate::capabilities::Capabilities;
use crate::config::RunConfig;
use crate::extract::SlideUnit;
use crate::ledger::Ledger;
use crate::prompts;
use std::path::Path;
use tracing::{debug, info, warn};

/// A cached context shorter than this is treated as unusable noise.
const MIN_CONTEXT_LEN: usize = 50;

fn usable(context: &str) -> bool {
    context.trim().len() >= MIN_CONTEXT_LEN
}

/// Acquire the GlobalContext for one locale, caching it in the ledger.
///
/// Resolution order: cached in this locale's ledger (unless force-retry) →
/// translated from the source locale's cached context → fresh deck-wide
/// vision analysis. A capability failure yields an empty context; drafting
/// proceeds without it.
pub async fn acquire_global_context(
    config: &RunConfig,
    caps: &Capabilities,
    locale: &str,
    units: &[SlideUnit],
    ledger: &mut Ledger,
    ledger_path: &Path,
    source_context: Option<&str>,
) -> String {
    if !config.force_retry && usable(&ledger.global_context) {
        debug!("Reusing cached context for {locale} ({} chars)", ledger.global_context.len());
        return ledger.global_context.clone();
    }

    if locale != config.source_locale() {
        if let (Some(src), Some(translator)) = (source_context, caps.translator.as_ref()) {
            if usable(src) {
                let prompt = prompts::translate_context_prompt(src, locale);
                match translator.translate(&prompt, locale, config.source_locale()).await {
                    Ok(translated) if usable(&translated) => {
                        info!("Context for {locale} translated from source locale");
                        ledger.global_context = translated.clone();
                        ledger.save(ledger_path);
                        return translated;
                    }
                    Ok(_) => warn!("Context translation for {locale} came back too short"),
                    Err(e) => warn!("Context translation for {locale} failed: {e}"),
                }
            }
        }
    }

    let rasters: Vec<Vec<u8>> = units.iter().map(|u| u.raster.clone()).collect();
    match caps
        .analyst
        .analyze(&rasters, prompts::OVERVIEW_INSTRUCTION)
        .await
    {
        Ok(context) if usable(&context) => {
            info!("Context for {locale} analyzed from {} slides", units.len());
            ledger.global_context = context.clone();
            ledger.save(ledger_path);
            context
        }
        Ok(context) => {
            warn!(
                "Deck analysis for {locale} produced only {} chars; proceeding without context",
                context.trim().len()
            );
            String::new()
        }
        Err(e) => {
            warn!("Deck analysis for {locale} failed: {e}; proceeding without context");
            String::new()
        }
    }
}
