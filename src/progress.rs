//! Progress-callback trait for per-slide enrichment events.
//!
//! Inject an [`Arc<dyn EnrichProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the pipeline works through each phase.
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, a database record, or a terminal
//! progress bar without the library knowing anything about how the host
//! application communicates. The trait is `Send + Sync`; although slides are
//! currently processed strictly in order, implementations should not rely on
//! being called from a single thread.

use std::sync::Arc;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Phase 1: narration (translate or generate speaker notes).
    Notes,
    /// Phase 2: visual regeneration or translation.
    Visuals,
    /// Phase 3: optional video prompt synthesis.
    Video,
}

/// Called by the pipeline as it processes each slide.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait EnrichProgressCallback: Send + Sync {
    /// Called once per (presentation, locale) run before any slide is touched.
    fn on_run_start(&self, locale: &str, total_slides: usize) {
        let _ = (locale, total_slides);
    }

    /// Called when a phase begins its full pass over the deck.
    fn on_phase_start(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called after a slide completes within a phase.
    ///
    /// `ok` is false when the slide ended in an error state (narration
    /// exhausted its retries, or no visual artifact was produced).
    fn on_slide_complete(&self, phase: Phase, slide: usize, total_slides: usize, ok: bool) {
        let _ = (phase, slide, total_slides, ok);
    }

    /// Called once after all phases.
    ///
    /// `visuals_written` reports whether the all-or-nothing guarantee held
    /// and the visuals-augmented container was actually produced.
    fn on_run_complete(&self, success: usize, failed: usize, visuals_written: bool) {
        let _ = (success, failed, visuals_written);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EnrichProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn EnrichProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        slides: AtomicUsize,
        failures: AtomicUsize,
    }

    impl EnrichProgressCallback for TrackingCallback {
        fn on_slide_complete(&self, _phase: Phase, _slide: usize, _total: usize, ok: bool) {
            self.slides.fetch_add(1, Ordering::SeqCst);
            if !ok {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("en", 5);
        cb.on_phase_start(Phase::Notes);
        cb.on_slide_complete(Phase::Notes, 1, 5, true);
        cb.on_run_complete(4, 1, false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            slides: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };
        cb.on_slide_complete(Phase::Notes, 1, 3, true);
        cb.on_slide_complete(Phase::Notes, 2, 3, false);
        cb.on_slide_complete(Phase::Visuals, 1, 3, true);
        assert_eq!(cb.slides.load(Ordering::SeqCst), 3);
        assert_eq!(cb.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start("fr", 10);
        cb.on_slide_complete(Phase::Video, 1, 10, true);
    }
}
