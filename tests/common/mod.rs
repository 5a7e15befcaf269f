//! Shared fixtures and scripted capability stubs for integration tests.

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use slidesage::{
    Analyst, AuditVerdict, Auditor, CapResult, Capabilities, CapabilityError, Designer,
    DraftReply, DraftRequest, Drafter, RunConfig, SlidePosition, Translator, VideoResponse,
    VideoSynthesizer,
};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Route pipeline logs to the test output; `RUST_LOG` controls verbosity.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const RELS_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#;

/// Write a minimal presentation container: one slide + notes part per entry
/// in `notes`, optionally with a macro binary part.
pub fn write_deck(path: &Path, notes: &[&str], macro_part: Option<&[u8]>) {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut add = |name: &str, data: &[u8]| {
            writer.start_file(name, options).unwrap();
            writer.write_all(data).unwrap();
        };

        let mut overrides = String::new();
        for i in 1..=notes.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/notesSlides/notesSlide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/>"#
            ));
        }
        add(
            "[Content_Types].xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{overrides}</Types>"#
            )
            .as_bytes(),
        );
        add(
            "ppt/presentation.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#,
        );
        let mut presentation_rels = format!("{RELS_HEADER}</Relationships>");
        if macro_part.is_some() {
            presentation_rels = presentation_rels.replacen(
                "</Relationships>",
                r#"<Relationship Id="rIdVBA1" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/></Relationships>"#,
                1,
            );
        }
        add("ppt/_rels/presentation.xml.rels", presentation_rels.as_bytes());

        for (i, note) in notes.iter().enumerate() {
            let idx = i + 1;
            add(
                &format!("ppt/slides/slide{idx}.xml"),
                br#"<?xml version="1.0"?><p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree/></p:cSld></p:sld>"#,
            );
            add(
                &format!("ppt/slides/_rels/slide{idx}.xml.rels"),
                format!(
                    r#"{RELS_HEADER}<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide{idx}.xml"/></Relationships>"#
                )
                .as_bytes(),
            );
            let body = if note.is_empty() {
                "<a:p/>".to_string()
            } else {
                format!("<a:p><a:r><a:t>{note}</a:t></a:r></a:p>")
            };
            add(
                &format!("ppt/notesSlides/notesSlide{idx}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notes xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{body}</p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#
                )
                .as_bytes(),
            );
        }

        if let Some(payload) = macro_part {
            add("ppt/vbaProject.bin", payload);
        }
    }
    std::fs::write(path, buf.into_inner()).unwrap();
}

/// Encode a small PNG, reused for rasters and designer output.
pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::new(4, 4);
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Write `count` rendered pages as `slide_N.png`.
pub fn write_rasters(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 1..=count {
        std::fs::write(dir.join(format!("slide_{i}.png")), png_bytes()).unwrap();
    }
}

/// A config with millisecond backoff so retry tests stay fast.
pub fn fast_config(deck: &Path, rasters: &Path) -> slidesage::RunConfigBuilder {
    RunConfig::builder(deck, rasters)
        .retry_base_delay_ms(1)
        .video_poll_interval_ms(1)
        .theme("integration test deck")
}

// ── Scripted capabilities ───────────────────────────────────────────────

pub struct StubAnalyst {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Analyst for StubAnalyst {
    async fn analyze(&self, images: &[Vec<u8>], _instruction: &str) -> CapResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "A technical walkthrough across {} slides, aimed at practitioners, \
             delivered by a pragmatic senior engineer.",
            images.len()
        ))
    }
}

pub struct StubDrafter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Drafter for StubDrafter {
    async fn draft(&self, request: &DraftRequest) -> CapResult<DraftReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DraftReply {
            text: format!(
                "Narration for slide {} in {}.",
                request.slide_index, request.locale
            ),
            partial: None,
        })
    }
}

/// A drafter that always errors, for exercising the retry bound.
pub struct FailingDrafter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Drafter for FailingDrafter {
    async fn draft(&self, _request: &DraftRequest) -> CapResult<DraftReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CapabilityError::new("model unavailable"))
    }
}

pub struct StubAuditor;

#[async_trait]
impl Auditor for StubAuditor {
    async fn audit(&self, _text: &str, _position: SlidePosition) -> CapResult<AuditVerdict> {
        Ok(AuditVerdict {
            useful: true,
            reason: "existing notes look coherent".into(),
        })
    }
}

pub struct StubTranslator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(
        &self,
        _text: &str,
        target_locale: &str,
        _source_locale: &str,
    ) -> CapResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Long enough to pass the minimum-usable-context length check.
        Ok(format!(
            "[{target_locale}] translated rendition of the material, preserving tone and structure."
        ))
    }
}

/// Designer returning a valid PNG, optionally declining when the prompt
/// contains a marker substring.
pub struct StubDesigner {
    pub calls: AtomicUsize,
    pub decline_when_prompt_contains: Option<String>,
}

impl StubDesigner {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            decline_when_prompt_contains: None,
        }
    }
}

#[async_trait]
impl Designer for StubDesigner {
    async fn design(&self, _images: &[Vec<u8>], prompt: &str) -> CapResult<Option<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.decline_when_prompt_contains {
            if prompt.contains(marker.as_str()) {
                return Ok(None);
            }
        }
        Ok(Some(png_bytes()))
    }
}

/// Synthesizer that parks the request in a pending job and completes after
/// `polls_needed` polls.
pub struct PendingVideo {
    pub polls_needed: u32,
    pub polls: AtomicU32,
}

#[async_trait]
impl VideoSynthesizer for PendingVideo {
    async fn generate(&self, _prompt: &str, _image: &[u8]) -> CapResult<VideoResponse> {
        Ok(VideoResponse {
            text: "generation queued".into(),
            pending_job: Some("job-1".into()),
        })
    }

    async fn poll(&self, _job: &str) -> CapResult<Option<String>> {
        let done = self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.polls_needed;
        Ok(done.then(|| "artifact ready at files/clip_done".to_string()))
    }
}

/// Capability bundle with counting stubs everywhere and no optional members.
pub struct StubBundle {
    pub analyst: Arc<StubAnalyst>,
    pub drafter: Arc<StubDrafter>,
    pub translator: Arc<StubTranslator>,
    pub designer: Arc<StubDesigner>,
}

impl StubBundle {
    pub fn new() -> Self {
        Self {
            analyst: Arc::new(StubAnalyst {
                calls: AtomicUsize::new(0),
            }),
            drafter: Arc::new(StubDrafter {
                calls: AtomicUsize::new(0),
            }),
            translator: Arc::new(StubTranslator {
                calls: AtomicUsize::new(0),
            }),
            designer: Arc::new(StubDesigner::new()),
        }
    }

    /// Bundle with the translator wired in.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            analyst: self.analyst.clone(),
            drafter: self.drafter.clone(),
            auditor: Arc::new(StubAuditor),
            designer: self.designer.clone(),
            translator: Some(self.translator.clone()),
            video: None,
        }
    }

    /// Bundle without a translator, forcing target locales to generate.
    pub fn capabilities_without_translator(&self) -> Capabilities {
        Capabilities {
            translator: None,
            ..self.capabilities()
        }
    }

    pub fn drafter_calls(&self) -> usize {
        self.drafter.calls.load(Ordering::SeqCst)
    }

    pub fn translator_calls(&self) -> usize {
        self.translator.calls.load(Ordering::SeqCst)
    }

    pub fn designer_calls(&self) -> usize {
        self.designer.calls.load(Ordering::SeqCst)
    }
}
