//! In-memory model of a zip-based presentation container.
//!
//! The deck is an OOXML package: a zip of XML parts plus media. This module
//! holds the whole part map in memory and performs the handful of edits the
//! pipeline needs — read a slide's notes text, overwrite notes with plain
//! narration, replace a slide's content with a full-bleed picture, force
//! 16:9 proportions — then serializes the entire container back out.
//! Partial/byte-range updates are deliberately unsupported: every save is a
//! whole-document rewrite.
//!
//! The macro binary part (`ppt/vbaProject.bin`) is **not** carried by this
//! model. Loading strips it and its descriptor registrations, mirroring how
//! document libraries regenerate packages without macro support; the
//! [`crate::archive`] preserver reinjects it from the original container at
//! serialization time.

use crate::error::SageError;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Internal path of the macro binary part.
pub const VBA_PART: &str = "ppt/vbaProject.bin";

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

/// 16:9 slide surface in EMU (10in × 5.625in).
const WIDESCREEN_CX: u64 = 9_144_000;
const WIDESCREEN_CY: u64 = 5_143_500;

static VBA_OVERRIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<Override[^>]*PartName="/ppt/vbaProject\.bin"[^>]*/>"#).unwrap()
});
static VBA_REL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<Relationship[^>]*vbaProject[^>]*/>"#).unwrap());
static SLD_SZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<p:sldSz[^>]*/>"#).unwrap());

/// An editable copy of a presentation container.
#[derive(Clone)]
pub struct Deck {
    source_path: PathBuf,
    parts: BTreeMap<String, Vec<u8>>,
    slide_count: usize,
}

impl Deck {
    /// Read a deck container into memory.
    ///
    /// Fatal on a missing file or an unreadable zip — a deck that cannot be
    /// opened aborts the whole run.
    pub fn open(path: &Path) -> Result<Deck, SageError> {
        let bytes = std::fs::read(path).map_err(|_| SageError::DeckNotFound {
            path: path.to_path_buf(),
        })?;
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| SageError::CorruptDeck {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| SageError::CorruptDeck {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            // Macro parts are reinjected by archive::preserve at save time.
            if name == VBA_PART {
                debug!("Dropping macro part from editable copy: {name}");
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| SageError::CorruptDeck {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            parts.insert(name, data);
        }

        if !parts.contains_key(PRESENTATION_PART) {
            return Err(SageError::MissingPart {
                path: path.to_path_buf(),
                part: PRESENTATION_PART.to_string(),
            });
        }

        let mut deck = Deck {
            source_path: path.to_path_buf(),
            slide_count: 0,
            parts,
        };
        deck.slide_count = deck.count_slides();
        deck.strip_macro_registrations();
        Ok(deck)
    }

    /// Number of slide parts in the container.
    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    /// Path of the container this deck was loaded from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Raw bytes of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    fn part_str(&self, name: &str) -> Option<String> {
        self.parts
            .get(name)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn count_slides(&self) -> usize {
        self.parts
            .keys()
            .filter(|name| {
                name.strip_prefix("ppt/slides/slide")
                    .and_then(|rest| rest.strip_suffix(".xml"))
                    .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            })
            .count()
    }

    fn strip_macro_registrations(&mut self) {
        if let Some(ct) = self.part_str(CONTENT_TYPES_PART) {
            let stripped = VBA_OVERRIDE_RE.replace_all(&ct, "").into_owned();
            self.parts
                .insert(CONTENT_TYPES_PART.to_string(), stripped.into_bytes());
        }
        if let Some(rels) = self.part_str(PRESENTATION_RELS_PART) {
            let stripped = VBA_REL_RE.replace_all(&rels, "").into_owned();
            self.parts
                .insert(PRESENTATION_RELS_PART.to_string(), stripped.into_bytes());
        }
    }

    // ── Notes ────────────────────────────────────────────────────────────

    /// The notes part backing slide `index` (1-based), resolved through the
    /// slide's relationship descriptor, falling back to the conventional
    /// `notesSlideN.xml` name.
    fn notes_part_name(&self, index: usize) -> Option<String> {
        let rels_name = format!("ppt/slides/_rels/slide{index}.xml.rels");
        if let Some(rels) = self.part_str(&rels_name) {
            if let Some(target) = rel_target(&rels, "notesSlide") {
                let resolved = resolve_target("ppt/slides", &target);
                if self.parts.contains_key(&resolved) {
                    return Some(resolved);
                }
            }
        }
        let conventional = format!("ppt/notesSlides/notesSlide{index}.xml");
        self.parts.contains_key(&conventional).then_some(conventional)
    }

    /// Extract the existing notes text of slide `index` (1-based).
    ///
    /// Concatenates the `<a:t>` runs of the slide's notes part, one line per
    /// paragraph, trimmed. A slide without a notes part yields `""`.
    pub fn existing_notes(&self, index: usize) -> String {
        let Some(part) = self.notes_part_name(index) else {
            return String::new();
        };
        let Some(xml) = self.part_str(&part) else {
            return String::new();
        };
        extract_text_runs(&xml)
    }

    /// Overwrite slide `index`'s notes with plain narration text — a single
    /// text body, one paragraph per input line, no bullet formatting.
    pub fn set_notes(&mut self, index: usize, text: &str) {
        let part = match self.notes_part_name(index) {
            Some(existing) => existing,
            None => {
                let created = format!("ppt/notesSlides/notesSlide{index}.xml");
                self.register_notes_part(index, &created);
                created
            }
        };
        let xml = notes_slide_xml(text);
        self.parts.insert(part, xml.into_bytes());
    }

    /// Register a freshly created notes part: content-type override, slide
    /// relationship, and (when a notes master exists) the notes part's own
    /// relationship descriptor. All edits are idempotent.
    fn register_notes_part(&mut self, index: usize, part_name: &str) {
        self.ensure_override(
            &format!("/{part_name}"),
            "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml",
        );

        let rels_name = format!("ppt/slides/_rels/slide{index}.xml.rels");
        let rel = format!(
            r#"<Relationship Id="rIdSageNotes" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide{index}.xml"/>"#
        );
        self.ensure_relationship(&rels_name, "notesSlide", &rel);

        if self.parts.contains_key("ppt/notesMasters/notesMaster1.xml") {
            let notes_rels = format!("ppt/notesSlides/_rels/notesSlide{index}.xml.rels");
            if !self.parts.contains_key(&notes_rels) {
                let doc = format!(
                    "{}<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster\" Target=\"../notesMasters/notesMaster1.xml\"/></Relationships>",
                    RELS_HEADER
                );
                self.parts.insert(notes_rels, doc.into_bytes());
            }
        }
    }

    // ── Visuals ──────────────────────────────────────────────────────────

    /// Replace slide `index`'s content with a single picture filling the
    /// whole slide surface, and register the image part.
    pub fn replace_slide_with_picture(&mut self, index: usize, image_bytes: Vec<u8>) {
        let media_name = format!("ppt/media/sage_slide{index}.png");
        self.parts.insert(media_name, image_bytes);
        self.ensure_png_default();

        let (cx, cy) = self.slide_size();
        let slide_part = format!("ppt/slides/slide{index}.xml");
        self.parts
            .insert(slide_part, picture_slide_xml(cx, cy).into_bytes());

        let rels_name = format!("ppt/slides/_rels/slide{index}.xml.rels");
        let rel = format!(
            r#"<Relationship Id="rIdSageVisual" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/sage_slide{index}.png"/>"#
        );
        self.ensure_relationship(&rels_name, "rIdSageVisual", &rel);
    }

    /// Slide surface in EMU, from `p:sldSz` (16:9 default when absent).
    pub fn slide_size(&self) -> (u64, u64) {
        let Some(xml) = self.part_str(PRESENTATION_PART) else {
            return (12_192_000, 6_858_000);
        };
        parse_slide_size(&xml).unwrap_or((12_192_000, 6_858_000))
    }

    /// Force the container to 16:9 proportions.
    pub fn force_widescreen(&mut self) {
        let Some(xml) = self.part_str(PRESENTATION_PART) else {
            return;
        };
        let replacement = format!(r#"<p:sldSz cx="{WIDESCREEN_CX}" cy="{WIDESCREEN_CY}"/>"#);
        let patched = SLD_SZ_RE.replace(&xml, replacement.as_str()).into_owned();
        self.parts
            .insert(PRESENTATION_PART.to_string(), patched.into_bytes());
    }

    // ── Descriptor patches ───────────────────────────────────────────────

    fn ensure_override(&mut self, part_name: &str, content_type: &str) {
        let Some(ct) = self.part_str(CONTENT_TYPES_PART) else {
            return;
        };
        let marker = format!("PartName=\"{part_name}\"");
        if ct.contains(&marker) {
            return;
        }
        let insert = format!(r#"<Override PartName="{part_name}" ContentType="{content_type}"/>"#);
        let patched = ct.replacen("</Types>", &format!("{insert}</Types>"), 1);
        self.parts
            .insert(CONTENT_TYPES_PART.to_string(), patched.into_bytes());
    }

    fn ensure_png_default(&mut self) {
        let Some(ct) = self.part_str(CONTENT_TYPES_PART) else {
            return;
        };
        if ct.contains("Extension=\"png\"") {
            return;
        }
        let insert = r#"<Default Extension="png" ContentType="image/png"/>"#;
        let patched = ct.replacen("</Types>", &format!("{insert}</Types>"), 1);
        self.parts
            .insert(CONTENT_TYPES_PART.to_string(), patched.into_bytes());
    }

    /// Append a relationship unless `marker` already appears in the
    /// descriptor; creates the descriptor when absent.
    fn ensure_relationship(&mut self, rels_name: &str, marker: &str, rel: &str) {
        match self.part_str(rels_name) {
            Some(rels) if rels.contains(marker) => {}
            Some(rels) => {
                let patched = rels.replacen("</Relationships>", &format!("{rel}</Relationships>"), 1);
                self.parts
                    .insert(rels_name.to_string(), patched.into_bytes());
            }
            None => {
                let doc = format!("{RELS_HEADER}{rel}</Relationships>");
                self.parts.insert(rels_name.to_string(), doc.into_bytes());
            }
        }
    }

    // ── Serialization ────────────────────────────────────────────────────

    /// Serialize the whole container (deflate) to `path`, atomically:
    /// write a temp file in the target directory, then rename over.
    pub fn save(&self, path: &Path) -> Result<(), SageError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| SageError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buf);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in &self.parts {
                writer
                    .start_file(name.as_str(), options)
                    .and_then(|_| writer.write_all(data).map_err(Into::into))
                    .map_err(|e| SageError::OutputWriteFailed {
                        path: path.to_path_buf(),
                        source: std::io::Error::other(e),
                    })?;
            }
            writer.finish().map_err(|e| SageError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        }

        let mut tmp = tempfile::Builder::new()
            .prefix("sage_deck_")
            .tempfile_in(dir)
            .map_err(|e| SageError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        tmp.write_all(buf.get_ref())
            .map_err(|e| SageError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        tmp.persist(path).map_err(|e| SageError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        debug!("Deck serialized to {}", path.display());
        Ok(())
    }
}

// ── XML helpers ──────────────────────────────────────────────────────────

const RELS_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#;

/// Pull the `Target` of the first relationship whose `Type` contains
/// `type_fragment` out of a relationship descriptor.
fn rel_target(rels_xml: &str, type_fragment: &str) -> Option<String> {
    let mut reader = Reader::from_str(rels_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut rel_type = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = attr.unescape_value().ok().map(|v| v.into_owned()),
                        b"Target" => target = attr.unescape_value().ok().map(|v| v.into_owned()),
                        _ => {}
                    }
                }
                if rel_type.is_some_and(|t| t.contains(type_fragment)) {
                    return target;
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                warn!("Unparseable relationship descriptor: {e}");
                return None;
            }
            _ => {}
        }
    }
}

/// Resolve a relationship target relative to `base` ("ppt/slides" etc.).
fn resolve_target(base: &str, target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        return stripped.to_string();
    }
    if let Some(stripped) = target.strip_prefix("../") {
        // Targets are relative to the part's directory; one level up from
        // ppt/slides is ppt/.
        let parent = base.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        return if parent.is_empty() {
            stripped.to_string()
        } else {
            format!("{parent}/{stripped}")
        };
    }
    format!("{base}/{target}")
}

/// Concatenate the `<a:t>` runs of a notes/slide part, one output line per
/// paragraph.
///
/// Entity references inside a run (`&amp;`, `&#233;`, …) arrive as separate
/// [`Event::GeneralRef`] events and must be resolved back into characters.
fn extract_text_runs(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run => {
                if let Ok(text) = t.decode() {
                    out.push_str(&text);
                }
            }
            Ok(Event::GeneralRef(r)) if in_run => {
                if let Some(ch) = resolve_general_ref(&r) {
                    out.push(ch);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Unparseable text body: {e}");
                break;
            }
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Resolve a character or predefined-entity reference to its character.
fn resolve_general_ref(r: &quick_xml::events::BytesRef) -> Option<char> {
    if let Ok(Some(ch)) = r.resolve_char_ref() {
        return Some(ch);
    }
    match r.decode().ok()?.as_ref() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        other => {
            warn!("Unknown entity reference '&{other};' in text body");
            None
        }
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Minimal notes part: one body placeholder, one plain paragraph per line.
fn notes_slide_xml(text: &str) -> String {
    let paragraphs: String = text
        .lines()
        .map(|line| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", xml_escape(line)))
        .collect();
    let body = if paragraphs.is_empty() {
        "<a:p/>".to_string()
    } else {
        paragraphs
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notes xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes Placeholder"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{body}</p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#
    )
}

/// Minimal slide part: a single full-bleed picture referencing
/// `rIdSageVisual`.
fn picture_slide_xml(cx: u64, cy: u64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:pic><p:nvPicPr><p:cNvPr id="2" name="Reimagined Slide"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rIdSageVisual"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld></p:sld>"#
    )
}

fn parse_slide_size(xml: &str) -> Option<(u64, u64)> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldSz" => {
                let mut cx = None;
                let mut cy = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"cx" => cx = attr.unescape_value().ok().and_then(|v| v.parse().ok()),
                        b"cy" => cy = attr.unescape_value().ok().and_then(|v| v.parse().ok()),
                        _ => {}
                    }
                }
                return cx.zip(cy);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}
