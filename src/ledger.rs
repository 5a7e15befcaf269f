//! Persisted idempotency/memoization ledger.
//!
//! One JSON ledger exists per (presentation, locale) pair. Entries are keyed
//! by slide index plus a short content hash of the slide's pre-existing
//! notes, so editing a slide's notes invalidates exactly that slide and
//! nothing else.
//!
//! ## Durability model
//!
//! The ledger is written through after every slide (not batched): a crash
//! mid-run loses at most the in-flight slide. Writes are atomic — a temp
//! file in the target directory is renamed over the ledger so readers never
//! observe a torn file. Ledger I/O is deliberately non-fatal: a missing or
//! corrupt file loads as an empty ledger, and a failed save is logged and
//! ignored. Losing memoization costs capability calls, never correctness.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error};

/// Terminal state of a slide's narration in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Success,
    Error,
}

/// One memoized slide result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideEntry {
    /// 1-based slide index.
    pub slide_index: usize,
    /// Short hash of the notes the slide carried when it was processed.
    pub existing_notes_hash: String,
    /// The pre-existing notes text, kept for auditability.
    pub original_notes: String,
    /// The final narration text (empty on error).
    pub note: String,
    pub status: NoteStatus,
}

/// Persisted memoization store for one (presentation, locale) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub slides: BTreeMap<String, SlideEntry>,
    #[serde(default)]
    pub global_context: String,
}

/// Short content hash used in ledger keys: first 8 hex chars of
/// SHA-256 over the notes text.
pub fn notes_hash(notes: &str) -> String {
    let digest = Sha256::digest(notes.as_bytes());
    hex::encode(&digest[..4])
}

/// Ledger key for a slide: `slide_{index}_{hash}`.
pub fn slide_key(index: usize, notes: &str) -> String {
    format!("slide_{}_{}", index, notes_hash(notes))
}

impl Ledger {
    /// Load a ledger from disk.
    ///
    /// A missing or unparseable file yields an empty ledger, never an error:
    /// the worst outcome of a lost ledger is redundant capability calls.
    pub fn load(path: &Path) -> Ledger {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(ledger) => ledger,
                Err(e) => {
                    error!("Ledger {} is corrupt ({}); starting empty", path.display(), e);
                    Ledger::default()
                }
            },
            Err(_) => Ledger::default(),
        }
    }

    /// Atomically persist the ledger: write a temp file in the same
    /// directory, then rename over the target. Failures are logged and
    /// swallowed — ledger I/O must never abort a run.
    pub fn save(&self, path: &Path) {
        if let Err(e) = self.try_save(path) {
            error!("Failed to save ledger {}: {}", path.display(), e);
        }
    }

    fn try_save(&self, path: &Path) -> std::io::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix("sage_ledger_")
            .suffix(".json")
            .tempfile_in(dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Ledger saved to {}", path.display());
        Ok(())
    }

    /// Look up the entry for a slide key.
    pub fn get(&self, key: &str) -> Option<&SlideEntry> {
        self.slides.get(key)
    }

    /// Record (or overwrite) the entry for a slide key.
    pub fn put(&mut self, key: String, entry: SlideEntry) {
        self.slides.insert(key, entry);
    }

    /// All successful notes keyed by slide index, used as the translation
    /// basis when this ledger belongs to the source locale.
    pub fn successful_notes(&self) -> BTreeMap<usize, String> {
        self.slides
            .values()
            .filter(|e| e.status == NoteStatus::Success && !e.note.is_empty())
            .map(|e| (e.slide_index, e.note.clone()))
            .collect()
    }
}
