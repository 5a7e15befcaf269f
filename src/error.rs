//! Error types for the slidesage library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SageError`] — **Fatal**: the run cannot proceed at all (missing deck,
//!   missing raster directory, unreadable container, invalid configuration).
//!   Returned as `Err(SageError)` from the top-level `enrich*` functions.
//!
//! * [`SlideError`] — **Non-fatal**: a single slide failed (the drafting
//!   workflow exhausted its retries, no visual could be produced) but all
//!   other slides are fine. Stored inside per-slide results so callers can
//!   inspect partial success rather than losing the whole deck to one bad
//!   slide.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! slide failure, log and continue, or collect all errors for a post-run
//! report. The pipeline itself always continues.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slidesage library.
///
/// Slide-level failures use [`SlideError`] and are stored in per-slide
/// results rather than propagated here.
#[derive(Debug, Error)]
pub enum SageError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The deck file was not found at the given path.
    #[error("Deck file not found: '{path}'\nCheck the path exists and is readable.")]
    DeckNotFound { path: PathBuf },

    /// The rendered-page directory was not found.
    #[error("Raster directory not found: '{path}'\nRender the deck pages to slide_N.png files first.")]
    RastersNotFound { path: PathBuf },

    /// No raster files matching `slide_N.png` were found in the directory.
    #[error("No slide rasters found in '{path}' (expected slide_1.png, slide_2.png, …)")]
    NoRasters { path: PathBuf },

    /// The deck exists but is not a readable zip container.
    #[error("Deck '{path}' is not a readable presentation container: {detail}")]
    CorruptDeck { path: PathBuf, detail: String },

    /// A required part is missing from the deck container.
    #[error("Deck '{path}' is missing required part '{part}'")]
    MissingPart { path: PathBuf, part: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output container.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// The enclosing phase records the error and moves on to the next slide;
/// only the run summary and the ledger remember it.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// The drafting workflow failed after all retries.
    #[error("Slide {slide}: narration failed after {attempts} attempts: {detail}")]
    DraftFailed {
        slide: usize,
        attempts: u32,
        detail: String,
    },

    /// No visual artifact could be produced for the slide.
    #[error("Slide {slide}: no visual artifact produced")]
    VisualMissing { slide: usize },

    /// Video generation failed (logged, never aborts the phase).
    #[error("Slide {slide}: video generation failed: {detail}")]
    VideoFailed { slide: usize, detail: String },
}
