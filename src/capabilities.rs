//! Generative capability contracts.
//!
//! Every generative dependency — vision analysis, drafting, auditing,
//! translation, image synthesis, video synthesis — is an opaque collaborator
//! behind a narrow, object-safe async trait, injected at orchestrator
//! construction. The pipeline never knows which model (or test stub) sits
//! behind a trait; it only relies on the call contracts below.
//!
//! Each trait has exactly one concern. Optional collaborators (translator,
//! video synthesizer) are `Option<Arc<dyn …>>` in [`Capabilities`]: their
//! absence selects the documented fallback behaviour (full generation, no
//! Phase 3) instead of an error.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A failure reported by a capability implementation.
///
/// The pipeline treats every capability error as transient and retryable;
/// permanently broken capabilities simply exhaust the retry budget.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type CapResult<T> = Result<T, CapabilityError>;

/// Where a slide sits in the deck; governs greeting/closing policy in the
/// drafting request and logo policy in the designer prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidePosition {
    First,
    Middle,
    Last,
}

impl SlidePosition {
    pub fn from_index(index: usize, total: usize) -> Self {
        if index <= 1 {
            SlidePosition::First
        } else if index >= total {
            SlidePosition::Last
        } else {
            SlidePosition::Middle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlidePosition::First => "first",
            SlidePosition::Middle => "middle",
            SlidePosition::Last => "last",
        }
    }
}

/// Advisory verdict on a slide's pre-existing notes.
#[derive(Debug, Clone)]
pub struct AuditVerdict {
    /// True when the existing notes are worth building on.
    pub useful: bool,
    pub reason: String,
}

/// Everything the drafting workflow needs to narrate one slide.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    /// 1-based slide index.
    pub slide_index: usize,
    /// Rendered raster of the slide page.
    pub raster: Vec<u8>,
    /// Notes the slide already carried, possibly empty.
    pub existing_notes: String,
    /// Advisory audit of the existing notes, when they were non-empty.
    pub existing_notes_verdict: Option<AuditVerdict>,
    /// First 200 characters of the previous slide's final narration.
    pub previous_summary: String,
    /// One-line presentation theme.
    pub theme: String,
    /// Speaker style directive.
    pub speaker_style: String,
    /// Narrative/persona summary for the whole deck.
    pub global_context: String,
    /// Greeting/closing policy marker.
    pub position: SlidePosition,
    /// Target locale for the narration text.
    pub locale: String,
}

/// Reply from the drafting workflow.
#[derive(Debug, Clone)]
pub struct DraftReply {
    /// Final narration text; may be empty when the workflow fizzled.
    pub text: String,
    /// Best intermediate output observed during the workflow, reported
    /// explicitly so the retry executor can salvage it.
    pub partial: Option<String>,
}

/// Reply from the video capability.
#[derive(Debug, Clone)]
pub struct VideoResponse {
    /// Free-text response; artifact references are extracted from it by
    /// pattern matching.
    pub text: String,
    /// Set when generation is asynchronous and must be polled to completion.
    pub pending_job: Option<String>,
}

/// Vision analysis: summarize slide imagery into narrative text.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, images: &[Vec<u8>], instruction: &str) -> CapResult<String>;
}

/// Narration drafting workflow.
#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> CapResult<DraftReply>;
}

/// Advisory audit of existing notes. Never gates regeneration.
#[async_trait]
pub trait Auditor: Send + Sync {
    async fn audit(&self, text: &str, position: SlidePosition) -> CapResult<AuditVerdict>;
}

/// Text translation between locales.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target_locale: &str,
        source_locale: &str,
    ) -> CapResult<String>;
}

/// Image synthesis. `Ok(None)` means the capability declined to produce an
/// image — distinct from an error, but handled the same way downstream.
#[async_trait]
pub trait Designer: Send + Sync {
    async fn design(&self, images: &[Vec<u8>], prompt: &str) -> CapResult<Option<Vec<u8>>>;
}

/// Video synthesis with optional asynchronous completion.
#[async_trait]
pub trait VideoSynthesizer: Send + Sync {
    /// Kick off generation for a prompt and slide raster.
    async fn generate(&self, prompt: &str, image: &[u8]) -> CapResult<VideoResponse>;

    /// Poll a pending job. `Ok(None)` means still running.
    async fn poll(&self, job: &str) -> CapResult<Option<String>>;
}

/// The full set of collaborators injected into the orchestrator.
#[derive(Clone)]
pub struct Capabilities {
    pub analyst: Arc<dyn Analyst>,
    pub drafter: Arc<dyn Drafter>,
    pub auditor: Arc<dyn Auditor>,
    pub designer: Arc<dyn Designer>,
    /// Absent translator: target locales fall back to full generation.
    pub translator: Option<Arc<dyn Translator>>,
    /// Absent synthesizer: Phase 3 is skipped even when requested.
    pub video: Option<Arc<dyn VideoSynthesizer>>,
}
