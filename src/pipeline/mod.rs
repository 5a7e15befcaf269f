//! The three enrichment phases.
//!
//! Each phase is a full pass over the slide units, run strictly in index
//! order (the rolling previous-slide summary and the visual style context
//! both depend on the prior slide). Phases never abort on a slide failure;
//! they record it and move on.

pub mod context;
pub mod notes;
pub mod video;
pub mod visuals;

use std::io::Write;
use std::path::Path;

/// Atomically persist artifact bytes: temp file in the target directory,
/// then rename over.
pub(crate) fn persist_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix("sage_artifact_")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
