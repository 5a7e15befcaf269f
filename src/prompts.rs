//! Prompt builders for every capability call.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how a locale is named or how the
//!    designer is briefed requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a capability, making prompt regressions easy to catch.

use crate::capabilities::SlidePosition;

/// Display name for a locale code, used inside prompts so the model sees a
/// human-readable language name rather than a BCP-47 tag.
pub fn locale_name(locale: &str) -> &str {
    match locale {
        "en" => "English",
        "zh-CN" => "Simplified Chinese (简体中文)",
        "zh-TW" => "Traditional Chinese (繁體中文)",
        "yue-HK" => "Cantonese (廣東話)",
        "es" => "Spanish (Español)",
        "fr" => "French (Français)",
        "ja" => "Japanese (日本語)",
        "ko" => "Korean (한국어)",
        "de" => "German (Deutsch)",
        "it" => "Italian (Italiano)",
        "pt" => "Portuguese (Português)",
        "ru" => "Russian (Русский)",
        "ar" => "Arabic (العربية)",
        "hi" => "Hindi (हिन्दी)",
        "th" => "Thai (ไทย)",
        "vi" => "Vietnamese (Tiếng Việt)",
        other => other,
    }
}

/// Instruction for the deck-wide vision analysis that produces the
/// GlobalContext.
pub const OVERVIEW_INSTRUCTION: &str =
    "Here are the slides for the entire presentation. Analyze them and produce \
     a narrative summary of the deck's story, audience, and speaker persona.";

/// Prompt for translating narration text to a target locale.
pub fn translate_notes_prompt(text: &str, target_locale: &str) -> String {
    let lang = locale_name(target_locale);
    format!(
        "Translate the following speaker notes to {lang}. \
         Maintain technical accuracy, educational tone, and clarity. \
         Preserve formatting and structure.\n\n\
         Notes:\n{text}\n\n\
         IMPORTANT: Provide ONLY the translated speaker notes in {lang}. \
         Do not include explanations or metadata."
    )
}

/// Prompt for translating the cached GlobalContext to a target locale.
pub fn translate_context_prompt(context: &str, target_locale: &str) -> String {
    let lang = locale_name(target_locale);
    format!("Translate the following presentation overview to {lang}:\n\n{context}")
}

/// Logo policy by slide position: branding belongs on the opening slide only.
fn logo_instruction(position: SlidePosition) -> &'static str {
    match position {
        SlidePosition::First => {
            "You MUST prominently feature the logo/branding from IMAGE 1 \
             (Original Draft Slide) in an appropriate corner."
        }
        _ => "DO NOT include any logos or branding elements. Focus solely on content.",
    }
}

/// Prompt for regenerating a slide visual from its raster and narration.
///
/// IMAGE 1 is always the original slide raster; IMAGE 2, when present, is
/// the style context (the previously generated visual) threaded forward for
/// visual continuity.
pub fn designer_prompt(
    narration: &str,
    position: SlidePosition,
    visual_style: &str,
    locale: &str,
    has_style_context: bool,
) -> String {
    let style_ref = if has_style_context {
        "Style Reference (Previous Slide) provided."
    } else {
        "N/A"
    };
    let lang_instruction = if locale != "en" {
        let lang = locale_name(locale);
        format!(
            "\n\nLANGUAGE: ALL text in the generated image MUST be in {lang}. \
             Do NOT include any English text. Translate all titles, labels, \
             and content to {lang}."
        )
    } else {
        String::new()
    };
    format!(
        "IMAGE 1: Original Slide Image provided.\n\n\
         IMAGE 2: {style_ref}\n\n\
         Speaker Notes: \"{narration}\"\n\n\
         Visual Style: {visual_style}\n\n\
         TASK: Generate the high-fidelity slide image now.\n\n\
         CONTEXT: {}{lang_instruction}\n",
        logo_instruction(position)
    )
}

/// Prompt for translating an already-generated source-locale visual: the
/// source visual is supplied as the reference image and the designer is
/// asked to re-render it with localized text.
pub fn visual_translation_prompt(narration: &str, target_locale: &str) -> String {
    let lang = locale_name(target_locale);
    format!(
        "Generate a slide visual in {lang} based on the reference image and \
         these speaker notes:\n\n{narration}\n\n\
         IMPORTANT:\n\
         - Translate all text to {lang}\n\
         - Maintain the same layout and design style as the reference\n\
         - Keep colors and branding consistent\n\
         - Make it professional and educational"
    )
}

/// Maximum length of the concept line embedded in a video prompt.
const VIDEO_CONCEPT_MAX_CHARS: usize = 150;

/// Derive a short video prompt from narration: the first line, cut at a
/// word boundary around 150 characters.
pub fn video_prompt(narration: &str) -> String {
    let trimmed = narration.trim();
    if trimmed.is_empty() {
        return "Create an engaging visual representation of key concepts.".to_string();
    }

    let first_line = trimmed.lines().next().unwrap_or(trimmed);
    let concept = truncate_at_word(first_line, VIDEO_CONCEPT_MAX_CHARS);

    format!(
        "Create a professional 8-10 second video that visually illustrates \
         this concept: {concept} Use modern design, clear visuals, and \
         professional animation. Focus on clarity and visual appeal."
    )
}

/// Cut `text` to at most `max_chars` characters, backing up to the last
/// space so words stay whole, and close with a period.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    let cut = head.rfind(' ').unwrap_or(head.len());
    format!("{}.", &head[..cut])
}
