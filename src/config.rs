//! Configuration types for a deck-enrichment run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across locales, log them, and diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::SageError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for an enrichment run.
///
/// Built via [`RunConfig::builder()`].
///
/// # Example
/// ```rust
/// use slidesage::RunConfig;
///
/// let config = RunConfig::builder("deck/talk.pptx", "deck/rasters")
///     .locales(["en", "fr"])
///     .theme("cloud infrastructure")
///     .generate_videos(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Path to the source deck container (`.pptx` or macro-enabled `.pptm`).
    pub deck_path: PathBuf,

    /// Directory of rendered page rasters, one `slide_N.png` per deck page
    /// (1-based). Rendering is the driver's job; the pipeline only pairs.
    pub rasters_dir: PathBuf,

    /// Output directory for containers, ledgers, visuals, and video prompts.
    /// Default: `generate/` next to the deck.
    pub output_dir: Option<PathBuf>,

    /// Ordered locale list. The first entry is the **source locale**: it is
    /// processed first and becomes the canonical basis for translating every
    /// other locale. Default: `["en"]`.
    pub locales: Vec<String>,

    /// Reprocess slides and contexts that already have ledger entries.
    /// Default: false.
    ///
    /// Without this flag a `(slide, content-hash)` pair with a `success`
    /// entry is replayed verbatim from the ledger with zero capability calls.
    pub force_retry: bool,

    /// Skip Phase 2 entirely; only the notes-only container is produced.
    /// Default: false.
    pub skip_visuals: bool,

    /// Run Phase 3 (video prompt synthesis + video capability). Default: false.
    pub generate_videos: bool,

    /// Visual style directive passed to the image designer (e.g.
    /// "minimalist", "cyberpunk"). Default: "professional".
    pub visual_style: String,

    /// Speaker style directive included in drafting requests. Default:
    /// "professional".
    pub speaker_style: String,

    /// One-line presentation theme included in every drafting request.
    pub theme: String,

    /// Maximum attempts for a generative call. Default: 3.
    ///
    /// An always-failing capability is invoked exactly this many times; the
    /// slide is then marked `error` and processing continues.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 2000.
    ///
    /// Doubles after each attempt: 2 s → 4 s. Empty and erroring capability
    /// responses are equally retryable.
    pub retry_base_delay_ms: u64,

    /// Backoff multiplier applied per attempt. Default: 2.
    pub retry_backoff_multiplier: u32,

    /// Fixed interval between video-completion polls in milliseconds.
    /// Default: 5000.
    pub video_poll_interval_ms: u64,

    /// Maximum number of completion polls per video; acts as the only
    /// timeout (there is no wall-clock deadline). Default: 24.
    pub video_max_polls: u32,

    /// Reserved fan-out limit. Validated but unused: slides are processed
    /// strictly in index order because the rolling previous-slide summary
    /// and the Phase-2 style context both depend on the prior slide.
    pub concurrency: usize,

    /// Optional per-slide progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("deck_path", &self.deck_path)
            .field("rasters_dir", &self.rasters_dir)
            .field("output_dir", &self.output_dir)
            .field("locales", &self.locales)
            .field("force_retry", &self.force_retry)
            .field("skip_visuals", &self.skip_visuals)
            .field("generate_videos", &self.generate_videos)
            .field("visual_style", &self.visual_style)
            .field("speaker_style", &self.speaker_style)
            .field("theme", &self.theme)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder with the two mandatory inputs.
    pub fn builder(deck_path: impl Into<PathBuf>, rasters_dir: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                deck_path: deck_path.into(),
                rasters_dir: rasters_dir.into(),
                output_dir: None,
                locales: vec!["en".to_string()],
                force_retry: false,
                skip_visuals: false,
                generate_videos: false,
                visual_style: "professional".to_string(),
                speaker_style: "professional".to_string(),
                theme: String::new(),
                max_retries: 3,
                retry_base_delay_ms: 2000,
                retry_backoff_multiplier: 2,
                video_poll_interval_ms: 5000,
                video_max_polls: 24,
                concurrency: 1,
                progress_callback: None,
            },
        }
    }

    /// The source locale: first entry of the ordered locale list.
    pub fn source_locale(&self) -> &str {
        &self.locales[0]
    }

    /// Deck file name without extension, used in every output name.
    pub fn base_name(&self) -> String {
        self.deck_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deck".to_string())
    }

    /// Output extension: macro-enabled decks keep their macro-enabled
    /// extension so the archive preserver can reinject the macro part.
    pub fn output_extension(&self) -> &'static str {
        match self.deck_path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pptm") => "pptm",
            _ => "pptx",
        }
    }

    /// Resolved output directory (`generate/` next to the deck by default).
    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .deck_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("generate"),
        }
    }

    /// Ledger file for a (presentation, locale) pair.
    pub fn ledger_path(&self, locale: &str) -> PathBuf {
        self.resolved_output_dir()
            .join(format!("{}_{}_progress.json", self.base_name(), locale))
    }

    /// Final notes-only container path for a locale.
    pub fn notes_output_path(&self, locale: &str) -> PathBuf {
        self.resolved_output_dir().join(format!(
            "{}_{}_with_notes.{}",
            self.base_name(),
            locale,
            self.output_extension()
        ))
    }

    /// Final visuals-augmented container path for a locale.
    pub fn visuals_output_path(&self, locale: &str) -> PathBuf {
        self.resolved_output_dir().join(format!(
            "{}_{}_with_visuals.{}",
            self.base_name(),
            locale,
            self.output_extension()
        ))
    }

    /// Per-locale directory of generated slide visuals.
    pub fn visuals_dir(&self, locale: &str) -> PathBuf {
        self.resolved_output_dir()
            .join(format!("{}_{}_visuals", self.base_name(), locale))
    }

    /// Per-locale directory of video prompts and artifact references.
    pub fn videos_dir(&self, locale: &str) -> PathBuf {
        self.resolved_output_dir()
            .join(format!("{}_{}_videos", self.base_name(), locale))
    }
}

/// Builder for [`RunConfig`].
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    pub fn force_retry(mut self, v: bool) -> Self {
        self.config.force_retry = v;
        self
    }

    pub fn skip_visuals(mut self, v: bool) -> Self {
        self.config.skip_visuals = v;
        self
    }

    pub fn generate_videos(mut self, v: bool) -> Self {
        self.config.generate_videos = v;
        self
    }

    pub fn visual_style(mut self, style: impl Into<String>) -> Self {
        self.config.visual_style = style.into();
        self
    }

    pub fn speaker_style(mut self, style: impl Into<String>) -> Self {
        self.config.speaker_style = style.into();
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = theme.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn retry_backoff_multiplier(mut self, m: u32) -> Self {
        self.config.retry_backoff_multiplier = m.max(1);
        self
    }

    pub fn video_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.video_poll_interval_ms = ms;
        self
    }

    pub fn video_max_polls(mut self, n: u32) -> Self {
        self.config.video_max_polls = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, SageError> {
        let c = &self.config;
        if c.locales.is_empty() {
            return Err(SageError::InvalidConfig(
                "At least one locale is required (the first is the source locale)".into(),
            ));
        }
        for (i, locale) in c.locales.iter().enumerate() {
            if locale.is_empty() {
                return Err(SageError::InvalidConfig("Empty locale code".into()));
            }
            if c.locales[..i].contains(locale) {
                return Err(SageError::InvalidConfig(format!(
                    "Duplicate locale '{locale}'"
                )));
            }
        }
        if c.max_retries == 0 {
            return Err(SageError::InvalidConfig("max_retries must be ≥ 1".into()));
        }
        if c.concurrency == 0 {
            return Err(SageError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = RunConfig::builder("talk.pptx", "rasters").build().unwrap();
        assert_eq!(c.source_locale(), "en");
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_multiplier, 2);
        assert!(!c.force_retry);
        assert_eq!(c.output_extension(), "pptx");
    }

    #[test]
    fn macro_enabled_deck_keeps_extension() {
        let c = RunConfig::builder("talk.pptm", "rasters").build().unwrap();
        assert_eq!(c.output_extension(), "pptm");
        assert!(c
            .notes_output_path("en")
            .to_string_lossy()
            .ends_with("talk_en_with_notes.pptm"));
    }

    #[test]
    fn duplicate_locale_rejected() {
        let r = RunConfig::builder("talk.pptx", "rasters")
            .locales(["en", "fr", "en"])
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn empty_locales_rejected() {
        let r = RunConfig::builder("talk.pptx", "rasters")
            .locales(Vec::<String>::new())
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn output_paths_follow_patterns() {
        let c = RunConfig::builder("/data/talk.pptx", "/data/rasters")
            .locales(["en", "ja"])
            .output_dir("/out")
            .build()
            .unwrap();
        assert_eq!(
            c.ledger_path("ja"),
            PathBuf::from("/out/talk_ja_progress.json")
        );
        assert_eq!(
            c.visuals_dir("en"),
            PathBuf::from("/out/talk_en_visuals")
        );
        assert_eq!(
            c.videos_dir("ja"),
            PathBuf::from("/out/talk_ja_videos")
        );
    }

    #[test]
    fn default_output_dir_is_generate_next_to_deck() {
        let c = RunConfig::builder("/data/talk.pptx", "/data/rasters")
            .build()
            .unwrap();
        assert_eq!(c.resolved_output_dir(), PathBuf::from("/data/generate"));
    }
}
