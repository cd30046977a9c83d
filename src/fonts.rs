//! Font registration and text measurement.
//!
//! `--font name,weight,file` flags are parsed into [`FontRegistration`]s up
//! front; the font files themselves are only read by the renderer, which
//! loads them into a [`FontManager`] and measures glyph advances with
//! `ttf-parser` for line wrapping.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Font style of a registered face. The command line only registers
/// upright faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
}

/// A validated `--font` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRegistration {
    pub family: String,
    pub weight: u32,
    pub source: PathBuf,
    pub style: FontStyle,
}

impl FontRegistration {
    /// Parse a single `name,weight,file` specification. Trailing empty
    /// fields (`Sans,400,sans.ttf,`) are dropped before counting.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut fields: Vec<&str> = spec.split(',').collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        let fields: Vec<&str> = fields.into_iter().map(str::trim).collect();
        let [family, weight, file] = fields.as_slice() else {
            return Err(invalid_spec(spec));
        };
        if family.is_empty() || file.is_empty() {
            return Err(invalid_spec(spec));
        }
        let weight = match weight.parse::<u32>() {
            Ok(w) if w > 0 => w,
            _ => {
                return Err(Error::Validation(format!(
                    "Invalid font weight '{weight}' in font specification: {spec}"
                )))
            }
        };
        Ok(Self {
            family: family.to_string(),
            weight,
            source: PathBuf::from(file),
            style: FontStyle::Normal,
        })
    }
}

fn invalid_spec(spec: &str) -> Error {
    Error::Validation(format!("Invalid font specification: {spec}"))
}

/// Parse every `--font` flag, in order. The first invalid entry fails the
/// whole list.
pub fn parse_font_specs<S: AsRef<str>>(specs: &[S]) -> Result<Vec<FontRegistration>> {
    specs
        .iter()
        .map(|s| FontRegistration::parse(s.as_ref()))
        .collect()
}

// ---------------------------------------------------------------------------
// Loaded faces
// ---------------------------------------------------------------------------

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
}

/// Registered faces. The family of the first registered face is the
/// document face.
#[derive(Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    primary_family: Option<String>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(
        &mut self,
        family: &str,
        weight: u32,
        bytes: Vec<u8>,
    ) -> std::result::Result<FontKey, String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            bytes,
        };

        let key = FontKey {
            family: family.to_string(),
            weight,
        };
        if self.primary_family.is_none() {
            self.primary_family = Some(key.family.clone());
        }
        self.fonts.insert(key.clone(), data);
        Ok(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Pick the document-face weight closest to 700 (bold) or 400.
    pub fn select(&self, bold: bool) -> Option<&FontKey> {
        let family = self.primary_family.as_ref()?;
        let target: i64 = if bold { 700 } else { 400 };
        self.fonts
            .keys()
            .filter(|k| &k.family == family)
            .min_by_key(|k| ((i64::from(k.weight) - target).abs(), k.weight))
    }

    pub fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts.get(key)
    }

    /// Measure the width of a string at a given font size (in pt).
    /// Without a loaded face we use an average character width heuristic
    /// (0.5 × font_size per char, 0.55 when bold).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let heuristic = || {
            let avg = if bold { 0.55 } else { 0.5 };
            text.chars().count() as f32 * font_size * avg
        };

        let Some(data) = self.select(bold).and_then(|k| self.fonts.get(k)) else {
            return heuristic();
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            Err(_) => heuristic(),
        }
    }

    /// Distance from the top of a line box to the baseline, in pt.
    pub fn ascender_pt(&self, font_size: f32, bold: bool) -> f32 {
        match self.select(bold).and_then(|k| self.fonts.get(k)) {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.75,
        }
    }
}

/// Word-wrap text to fit within `max_width` points. Existing newlines are
/// kept as hard breaks.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current_line, word)
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
