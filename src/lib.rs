//! # slidesage
//!
//! Enrich a slide deck with generated narration, localized text,
//! regenerated imagery, and optional short videos.
//!
//! The pipeline is stateful, idempotent and multi-phase. A persisted
//! per-(presentation, locale) ledger keyed by slide index plus a content
//! hash of each slide's pre-existing notes makes reruns cheap: completed
//! slides replay from the ledger with zero generative calls, and editing a
//! slide's notes invalidates exactly that slide. Generative calls run
//! through a bounded retry executor with exponential backoff and
//! best-partial salvage. The visuals-augmented output is all-or-nothing:
//! it is only produced when every slide received a visual. Macro-enabled
//! decks keep their macro binary part byte-for-byte via zip-level surgery
//! at serialization time.
//!
//! Every generative dependency (vision analysis, drafting, auditing,
//! translation, image and video synthesis) is injected behind a narrow
//! async trait — see [`capabilities`]. The library performs no CLI
//! parsing, no config-file loading, and no logging setup; hosts wire those
//! up themselves.
//!
//! ## Example
//!
//! ```rust,ignore
//! use slidesage::{enrich, Capabilities, RunConfig};
//!
//! let config = RunConfig::builder("deck/talk.pptx", "deck/rasters")
//!     .locales(["en", "fr", "ja"])
//!     .theme("cloud infrastructure")
//!     .build()?;
//! let caps: Capabilities = build_capabilities();
//! let outputs = enrich(&config, &caps).await?;
//! for out in outputs {
//!     println!("{}: {:?}", out.locale, out.notes_container);
//! }
//! ```
//!
//! ## Phases
//!
//! 1. **Notes** — per slide: replay from the ledger, translate from the
//!    source locale, or generate through the retry executor.
//! 2. **Visuals** — full pass after notes: regenerate or translate each
//!    slide image, threading the previous visual forward as style context.
//! 3. **Video** — optional: derive a short prompt per slide, invoke the
//!    synthesizer, poll bounded, persist the prompt file regardless.

pub mod archive;
pub mod capabilities;
pub mod config;
pub mod deck;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod retry;

pub use capabilities::{
    Analyst, AuditVerdict, Auditor, CapResult, Capabilities, CapabilityError, Designer,
    DraftReply, DraftRequest, Drafter, SlidePosition, Translator, VideoResponse,
    VideoSynthesizer,
};
pub use config::{RunConfig, RunConfigBuilder};
pub use deck::Deck;
pub use error::{SageError, SlideError};
pub use extract::SlideUnit;
pub use ledger::{notes_hash, slide_key, Ledger, NoteStatus, SlideEntry};
pub use output::{LocaleOutput, RunStats, VideoArtifact};
pub use process::{enrich, enrich_locale};
pub use progress::{EnrichProgressCallback, NoopProgressCallback, Phase, ProgressCallback};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
