//! Notes document rendering
//!
//! Notes become a PDF through `printpdf`. Scripts the standard Helvetica
//! faces cannot show (Devanagari, Telugu, Kannada, Tamil) need a TrueType
//! font per language, loaded once at startup from the font directory.

use crate::chunker::chunk;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Font file per language whose script is outside Latin-1
pub const FONT_MAP: &[(&str, &str)] = &[
    ("Hindi", "NotoSansDevanagari-Regular.ttf"),
    ("Marathi", "NotoSansDevanagari-Regular.ttf"),
    ("Telugu", "NotoSansTelugu-Regular.ttf"),
    ("Kannada", "NotoSansKannada-Regular.ttf"),
    ("Tamil", "NotoSansTamil-Regular.ttf"),
];

/// Used for every other language when present
pub const FALLBACK_FONT: &str = "NotoSans-Regular.ttf";

// US Letter, in millimetres
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.4;
const LEADING: f32 = 5.3;
const TITLE_GAP: f32 = 10.0;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 11.0;
const LINES_PER_PAGE: usize = 42;
const FIRST_PAGE_LINES: usize = 40;
/// Characters per body line at `BODY_SIZE` within the margins
const WRAP_CHARS: usize = 85;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Nothing to render")]
    Empty,
    #[error("Text uses characters the document font cannot display")]
    UnsupportedText,
    #[error("No font installed for {0}")]
    FontUnavailable(String),
    #[error("PDF generation failed: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// A rendered file ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Turns notes into document bytes
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, title: &str, body: &str, language: &str) -> Result<Document, RenderError>;
}

/// `Photosynthesis in plants` -> `Photosynthesis_in_plants_notes.pdf`
pub fn notes_filename(topic: &str) -> String {
    format!("{}_notes.pdf", topic.trim().replace(' ', "_"))
}

/// Font file a language needs, if its script requires one
pub fn required_font(language: &str) -> Option<&'static str> {
    FONT_MAP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(language.trim()))
        .map(|(_, file)| *file)
}

/// Face chosen for one document
#[derive(Debug, PartialEq, Eq)]
enum Face<'a> {
    Builtin,
    Embedded(&'a [u8]),
}

/// PDF renderer with per-language embedded fonts
#[derive(Debug, Default, Clone)]
pub struct PdfRenderer {
    /// Keyed by lower-cased language name
    fonts: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
}

impl PdfRenderer {
    /// Renderer with only the built-in Helvetica faces
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, language: &str, bytes: Vec<u8>) -> Self {
        self.fonts.insert(language.trim().to_lowercase(), bytes);
        self
    }

    pub fn with_fallback_font(mut self, bytes: Vec<u8>) -> Self {
        self.fallback = Some(bytes);
        self
    }

    /// Load every font from `FONT_MAP` and the fallback that exists in `dir`
    pub fn from_dir(dir: &Path) -> Self {
        let mut renderer = Self::new();
        for (language, file) in FONT_MAP {
            match std::fs::read(dir.join(file)) {
                Ok(bytes) => renderer = renderer.with_font(language, bytes),
                Err(e) => tracing::warn!(%language, font = %file, error = %e, "Font not loaded"),
            }
        }
        match std::fs::read(dir.join(FALLBACK_FONT)) {
            Ok(bytes) => renderer = renderer.with_fallback_font(bytes),
            Err(_) => tracing::info!("No fallback font, using built-in Helvetica"),
        }
        renderer
    }

    fn face(&self, language: &str) -> Result<Face<'_>, RenderError> {
        if let Some(bytes) = self.fonts.get(&language.trim().to_lowercase()) {
            return Ok(Face::Embedded(bytes));
        }
        if required_font(language).is_some() {
            return Err(RenderError::FontUnavailable(language.trim().to_string()));
        }
        Ok(self
            .fallback
            .as_deref()
            .map_or(Face::Builtin, Face::Embedded))
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, title: &str, body: &str, language: &str) -> Result<Document, RenderError> {
        let lines = layout(body);
        if lines.is_empty() {
            return Err(RenderError::Empty);
        }
        let face = self.face(language)?;
        if face == Face::Builtin && !mostly_encodable(body) {
            return Err(RenderError::UnsupportedText);
        }
        Ok(Document {
            filename: notes_filename(title),
            bytes: write_pdf(title.trim(), &paginate(&lines), &face)?,
        })
    }
}

/// Normalize Markdown-ish notes into wrapped display lines
fn layout(body: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in body.lines() {
        let line = raw.trim().replace("**", "");
        if line.is_empty() {
            // Collapse runs of blank lines
            if lines.last().is_some_and(|l: &String| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        let line = match line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
            Some(rest) => format!("\u{2022} {}", rest.trim_start()),
            None => line,
        };
        lines.extend(chunk(&line, WRAP_CHARS));
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Lines per page; the first page leaves room for the title
fn paginate(lines: &[String]) -> Vec<&[String]> {
    let (first, rest) = lines.split_at(lines.len().min(FIRST_PAGE_LINES));
    std::iter::once(first)
        .chain(rest.chunks(LINES_PER_PAGE))
        .collect()
}

/// True when the built-in WinAnsi faces can show `c`
fn win_ansi(c: char) -> bool {
    matches!(
        c,
        ' '..='~'
            | '\u{00A0}'..='\u{00FF}'
            | '\u{2022}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{2018}'
            | '\u{2019}'
            | '\u{201C}'
            | '\u{201D}'
            | '\u{2026}'
            | '\u{20AC}'
    )
}

/// At least half of the visible characters must be displayable
fn mostly_encodable(text: &str) -> bool {
    let (mut total, mut ok) = (0usize, 0usize);
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if win_ansi(c) {
            ok += 1;
        }
    }
    ok * 2 >= total
}

/// Built-in faces silently drop unknown glyphs; show them as `?` instead
fn builtin_text(text: &str) -> String {
    text.chars()
        .map(|c| if win_ansi(c) || c.is_whitespace() { c } else { '?' })
        .collect()
}

fn fonts(
    doc: &PdfDocumentReference,
    face: &Face<'_>,
) -> Result<(IndirectFontRef, IndirectFontRef), RenderError> {
    Ok(match face {
        Face::Builtin => (
            doc.add_builtin_font(BuiltinFont::Helvetica)?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
        ),
        Face::Embedded(bytes) => {
            let font = doc.add_external_font(*bytes)?;
            (font.clone(), font)
        }
    })
}

fn write_pdf(title: &str, pages: &[&[String]], face: &Face<'_>) -> Result<Vec<u8>, RenderError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Notes");
    let (body_font, title_font) = fonts(&doc, face)?;
    let shown = |text: &str| match face {
        Face::Builtin => builtin_text(text),
        Face::Embedded(_) => text.to_string(),
    };

    for (i, lines) in pages.iter().enumerate() {
        let (page, layer) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Notes")
        };
        let layer = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT - MARGIN;
        if i == 0 {
            layer.use_text(shown(title), TITLE_SIZE, Mm(MARGIN), Mm(y), &title_font);
            y -= TITLE_GAP;
        }
        for line in *lines {
            y -= LEADING;
            if !line.is_empty() {
                layer.use_text(shown(line), BODY_SIZE, Mm(MARGIN), Mm(y), &body_font);
            }
        }
    }

    Ok(doc.save_to_bytes()?)
}
