//! Pairing of deck slides with their rendered rasters.
//!
//! Rendering is the driver's responsibility: the pipeline expects a
//! directory of `slide_N.png` files (1-based) produced by whatever renderer
//! the caller prefers. This module pairs slide `i` of the container with
//! `slide_i.png` and produces the unit of work every phase operates on.

use crate::deck::Deck;
use crate::error::SageError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static RASTER_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^slide_(\d+)\.png$").unwrap());

/// One slide's worth of pipeline input: the rendered page plus the notes the
/// deck already carried for it.
#[derive(Debug, Clone)]
pub struct SlideUnit {
    /// 1-based slide index.
    pub index: usize,
    /// Path of the rendered page, kept for logging and video artifacts.
    pub raster_path: PathBuf,
    /// Rendered page bytes (PNG).
    pub raster: Vec<u8>,
    /// Notes text the slide carried before enrichment ("" when none).
    pub existing_notes: String,
    /// Short hash of `existing_notes`, part of the slide's ledger key.
    pub content_hash: String,
}

/// Pair deck slides with rasters, in index order.
///
/// The pairing stops at the shorter side: a deck with more slides than
/// rasters (or vice versa) processes only the paired prefix, with a warning.
/// Rasters are read eagerly and probed with the image decoder so an
/// unreadable render fails here, before any capability call is spent on it.
pub fn extract_units(deck: &Deck, rasters_dir: &Path) -> Result<Vec<SlideUnit>, SageError> {
    if !rasters_dir.is_dir() {
        return Err(SageError::RastersNotFound {
            path: rasters_dir.to_path_buf(),
        });
    }

    let available = count_rasters(rasters_dir)?;
    if available == 0 {
        return Err(SageError::NoRasters {
            path: rasters_dir.to_path_buf(),
        });
    }

    let slide_count = deck.slide_count();
    let limit = slide_count.min(available);
    if limit < slide_count {
        warn!(
            "Deck has {slide_count} slides but only {available} rasters; processing {limit}"
        );
    } else if available > slide_count {
        warn!(
            "Raster directory has {available} renders for a {slide_count}-slide deck; extras ignored"
        );
    }

    let mut units = Vec::with_capacity(limit);
    for index in 1..=limit {
        let raster_path = rasters_dir.join(format!("slide_{index}.png"));
        let raster = std::fs::read(&raster_path).map_err(|e| SageError::Internal(format!(
            "Failed to read raster {}: {e}",
            raster_path.display()
        )))?;
        match image::load_from_memory(&raster) {
            Ok(img) => debug!(
                "Slide {index}: raster {}×{}",
                img.width(),
                img.height()
            ),
            Err(e) => {
                return Err(SageError::Internal(format!(
                    "Raster {} is not a decodable image: {e}",
                    raster_path.display()
                )))
            }
        }
        let existing_notes = deck.existing_notes(index);
        let content_hash = crate::ledger::notes_hash(&existing_notes);
        units.push(SlideUnit {
            index,
            raster_path,
            raster,
            existing_notes,
            content_hash,
        });
    }
    Ok(units)
}

/// Count the contiguous raster prefix `slide_1.png … slide_N.png`.
///
/// Gaps end the prefix: a directory holding `slide_1.png` and `slide_3.png`
/// pairs only slide 1, since slide 2 has no render to draft from.
fn count_rasters(dir: &Path) -> Result<usize, SageError> {
    let mut indices = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|_| SageError::RastersNotFound {
        path: dir.to_path_buf(),
    })?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = RASTER_NAME_RE.captures(name) {
            if let Ok(n) = caps[1].parse::<usize>() {
                indices.push(n);
            }
        }
    }
    indices.sort_unstable();
    let mut contiguous = 0;
    for (pos, n) in indices.iter().enumerate() {
        if *n == pos + 1 {
            contiguous = *n;
        } else {
            break;
        }
    }
    if contiguous < indices.len() {
        warn!(
            "Raster directory {} has gaps; using contiguous prefix of {contiguous}",
            dir.display()
        );
    }
    Ok(contiguous)
}
