//! Result types returned by an enrichment run.

use crate::error::SlideError;
use std::path::PathBuf;

/// Summary counters for one (presentation, locale) run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Slides whose narration ended in a `success` ledger entry.
    pub success_slides: usize,
    /// Slides whose narration ended in an `error` ledger entry.
    pub error_slides: usize,
    /// Visual artifacts present on disk after Phase 2.
    pub visuals_written: usize,
    /// Slides for which no visual artifact could be produced.
    pub visuals_missing: usize,
}

/// One slide's video outcome.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    /// 1-based slide index.
    pub slide_index: usize,
    /// Path of the persisted prompt text file (always written).
    pub prompt_path: PathBuf,
    /// Extracted artifact reference, when generation produced one.
    pub reference: Option<String>,
}

/// Everything produced for one locale.
#[derive(Debug, Clone)]
pub struct LocaleOutput {
    pub locale: String,
    /// Notes-only container; written on every run.
    pub notes_container: PathBuf,
    /// Visuals-augmented container; `Some` iff every slide got a visual.
    pub visuals_container: Option<PathBuf>,
    /// Video outcomes, empty unless Phase 3 ran.
    pub videos: Vec<VideoArtifact>,
    /// Non-fatal per-slide failures collected across all phases.
    pub slide_errors: Vec<SlideError>,
    pub stats: RunStats,
}

impl LocaleOutput {
    /// True when every slide narrated successfully and, if Phase 2 ran,
    /// every slide got a visual.
    pub fn is_complete(&self) -> bool {
        self.stats.error_slides == 0 && self.stats.visuals_missing == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_tracks_errors_and_missing_visuals() {
        let mut out = LocaleOutput {
            locale: "en".into(),
            notes_container: PathBuf::from("/out/talk_en_with_notes.pptx"),
            visuals_container: None,
            videos: Vec::new(),
            slide_errors: Vec::new(),
            stats: RunStats {
                success_slides: 3,
                ..RunStats::default()
            },
        };
        assert!(out.is_complete());

        out.stats.visuals_missing = 1;
        assert!(!out.is_complete());
    }
}
