//! Macro preservation for generated containers.
//!
//! Regenerated containers lose the macro binary part: the deck model drops
//! it on load. For macro-enabled decks the original part must survive
//! byte-for-byte into the final output, so this module performs the
//! reinjection at serialization time:
//!
//! 1. extract `ppt/vbaProject.bin` from the *source* container,
//! 2. unpack the generated container's parts,
//! 3. inject the macro part and patch its registrations into
//!    `[Content_Types].xml` and `ppt/_rels/presentation.xml.rels`
//!    (idempotently — re-running the surgery never duplicates entries),
//! 4. re-pack (deflate) to the final path and remove the intermediate.
//!
//! Any failure degrades to a plain move of the generated container: a
//! macro-less output beats no output.

use crate::deck::VBA_PART;
use crate::error::SageError;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const VBA_CONTENT_TYPE: &str = "application/vnd.ms-office.vbaProject";
const PLAIN_MAIN_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const MACRO_MAIN_CONTENT_TYPE: &str =
    "application/vnd.ms-powerpoint.presentation.macroEnabled.main+xml";

/// Move a generated container to its final path, reinjecting the source
/// deck's macro part when the destination is macro-enabled.
///
/// Surgery runs only when the destination extension is macro-enabled *and*
/// the source actually carries a macro part; otherwise (and on any surgery
/// failure) the generated file is moved as-is.
pub fn preserve(source: &Path, generated: &Path, destination: &Path) -> Result<(), SageError> {
    let wants_macro = destination
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pptm"));

    if wants_macro {
        match extract_macro_part(source) {
            Some(macro_part) => match reinject(generated, destination, &macro_part) {
                Ok(()) => {
                    info!(
                        "Macro part ({} bytes) restored into {}",
                        macro_part.len(),
                        destination.display()
                    );
                    let _ = std::fs::remove_file(generated);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Macro reinjection failed ({e}); writing macro-less output");
                }
            },
            None => {
                warn!(
                    "Source {} carries no macro part; writing macro-less output",
                    source.display()
                );
            }
        }
    }

    move_file(generated, destination)
}

/// Pull `ppt/vbaProject.bin` out of the source container, if present.
fn extract_macro_part(source: &Path) -> Option<Vec<u8>> {
    let bytes = std::fs::read(source).ok()?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut file = archive.by_name(VBA_PART).ok()?;
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data).ok()?;
    debug!("Extracted macro part: {} bytes", data.len());
    Some(data)
}

fn reinject(generated: &Path, destination: &Path, macro_part: &[u8]) -> std::io::Result<()> {
    let bytes = std::fs::read(generated)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(std::io::Error::other)?;

    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(std::io::Error::other)?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        parts.insert(file.name().to_string(), data);
    }

    parts.insert(VBA_PART.to_string(), macro_part.to_vec());
    patch_content_types(&mut parts)?;
    patch_presentation_rels(&mut parts)?;

    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &parts {
            writer
                .start_file(name.as_str(), options)
                .map_err(std::io::Error::other)?;
            writer.write_all(data)?;
        }
        writer.finish().map_err(std::io::Error::other)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("sage_final_")
        .tempfile_in(dir)?;
    tmp.write_all(buf.get_ref())?;
    tmp.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// Register the macro part's content type and flip the main part to the
/// macro-enabled type. Both edits are skipped when already present.
fn patch_content_types(parts: &mut BTreeMap<String, Vec<u8>>) -> std::io::Result<()> {
    let raw = parts
        .get(CONTENT_TYPES_PART)
        .ok_or_else(|| std::io::Error::other("generated container has no content types part"))?;
    let mut ct = String::from_utf8_lossy(raw).into_owned();

    if !ct.contains("vbaProject.bin") {
        let insert = format!(
            r#"<Override PartName="/{VBA_PART}" ContentType="{VBA_CONTENT_TYPE}"/>"#
        );
        ct = ct.replacen("</Types>", &format!("{insert}</Types>"), 1);
    }
    if ct.contains(PLAIN_MAIN_CONTENT_TYPE) {
        ct = ct.replace(PLAIN_MAIN_CONTENT_TYPE, MACRO_MAIN_CONTENT_TYPE);
    }

    parts.insert(CONTENT_TYPES_PART.to_string(), ct.into_bytes());
    Ok(())
}

/// Register the presentation's relationship to the macro part, unless one
/// is already there.
fn patch_presentation_rels(parts: &mut BTreeMap<String, Vec<u8>>) -> std::io::Result<()> {
    let raw = parts.get(PRESENTATION_RELS_PART).ok_or_else(|| {
        std::io::Error::other("generated container has no presentation relationships")
    })?;
    let mut rels = String::from_utf8_lossy(raw).into_owned();

    if !rels.contains("vbaProject") {
        let rel = r#"<Relationship Id="rIdVBA1" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/>"#;
        rels = rels.replacen("</Relationships>", &format!("{rel}</Relationships>"), 1);
        parts.insert(PRESENTATION_RELS_PART.to_string(), rels.into_bytes());
    }
    Ok(())
}

/// Plain move, falling back to copy+remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), SageError> {
    if let Some(dir) = to.parent() {
        std::fs::create_dir_all(dir).map_err(|e| SageError::OutputWriteFailed {
            path: to.to_path_buf(),
            source: e,
        })?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| SageError::OutputWriteFailed {
        path: to.to_path_buf(),
        source: e,
    })?;
    let _ = std::fs::remove_file(from);
    Ok(())
}
