//! PDF renderer – lays out a strict document and writes PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use log::{Level, LevelFilter};
use printpdf::*;
use url::Url;

use crate::conformance::{self, AccessibleMetadata};
use crate::dom::StrictDocument;
use crate::error::{Error, Result};
use crate::fonts::{FontKey, FontManager};
use crate::layout::{
    collect_blocks, fit_figure, paginate, Block, BoxContent, DocumentLayout, LayoutBox,
    PageGeometry,
};
use crate::normalize::{absolute_normalized, parse_xhtml, DocumentSource};
use crate::request::{ConformanceMode, ConversionRequest};
use crate::resources::{ResourceKind, ResourceLoader};
use crate::svg::{declared_size, DEFAULT_SVG_SIZE};

/// Single-shot rendering of a fully configured request into a sink.
pub trait Renderer {
    fn render(&self, request: &ConversionRequest, sink: &mut dyn Write) -> Result<()>;
}

/// The built-in flow-layout PDF renderer.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    /// Most verbose diagnostic level this renderer emits.
    log_level: LevelFilter,
    geometry: PageGeometry,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(LevelFilter::Warn)
    }
}

/// A placed image or SVG form, with the pixel size the XObject is drawn at.
struct Figure {
    xobj_id: XObjectId,
    px_width: f32,
    px_height: f32,
}

impl PdfRenderer {
    pub fn new(log_level: LevelFilter) -> Self {
        Self {
            log_level,
            geometry: PageGeometry::default(),
        }
    }

    fn diag(&self, level: Level, args: fmt::Arguments<'_>) {
        if level <= self.log_level {
            log::log!(target: "htmlpdf::render", level, "{args}");
        }
    }

    /// The document to render and the base URI for its relative references.
    fn load_document<'r>(
        &self,
        source: &'r DocumentSource,
    ) -> Result<(Cow<'r, StrictDocument>, Url)> {
        match source {
            DocumentSource::Tree { document, base_uri } => {
                Ok((Cow::Borrowed(document), base_uri.clone()))
            }
            DocumentSource::File(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::Render(format!("cannot read '{}': {e}", path.display())))?;
                let document = parse_xhtml(&text).map_err(|e| {
                    Error::Render(format!("'{}' is not well-formed XHTML: {e}", path.display()))
                })?;
                let abs = absolute_normalized(path)?;
                let base = Url::from_file_path(&abs).map_err(|()| {
                    Error::Render(format!("cannot derive a base URI from '{}'", abs.display()))
                })?;
                Ok((Cow::Owned(document), base))
            }
        }
    }

    fn load_fonts(
        &self,
        request: &ConversionRequest,
        doc: &mut PdfDocument,
    ) -> Result<(FontManager, HashMap<FontKey, FontId>)> {
        let mut fonts = FontManager::new();
        let mut ids = HashMap::new();
        for reg in &request.fonts {
            let bytes = std::fs::read(&reg.source).map_err(|e| {
                Error::Render(format!("cannot read font '{}': {e}", reg.source.display()))
            })?;
            let mut warnings = Vec::new();
            let parsed = ParsedFont::from_bytes(&bytes, 0, &mut warnings).ok_or_else(|| {
                Error::Render(format!("'{}' is not a usable font", reg.source.display()))
            })?;
            let key = fonts
                .load_font(&reg.family, reg.weight, bytes)
                .map_err(|e| Error::Render(format!("'{}': {e}", reg.source.display())))?;
            ids.insert(key, doc.add_font(&parsed));
            self.diag(
                Level::Debug,
                format_args!("Registered font '{}' weight {}", reg.family, reg.weight),
            );
        }
        Ok((fonts, ids))
    }

    /// Fetch and register every image and inline SVG. Blocks whose resource
    /// is blocked or broken are left out of the returned map.
    fn load_figures(
        &self,
        blocks: &[Block],
        request: &ConversionRequest,
        loader: &ResourceLoader<'_>,
        doc: &mut PdfDocument,
    ) -> HashMap<usize, Figure> {
        let mut figures = HashMap::new();
        for block in blocks {
            match block {
                Block::Image { id, src, .. } => {
                    let Some(resource) = loader.fetch(src, ResourceKind::Image) else {
                        self.diag(Level::Warn, format_args!("Image '{src}' was not loaded"));
                        continue;
                    };
                    let figure = if resource.is_svg() {
                        self.import_svg_resource(&resource.bytes, request, doc)
                    } else {
                        self.import_raster(&resource.bytes, doc)
                    };
                    match figure {
                        Ok(f) => {
                            figures.insert(*id, f);
                        }
                        Err(e) => {
                            self.diag(Level::Warn, format_args!("Skipping image '{src}': {e}"))
                        }
                    }
                }
                Block::Svg {
                    id,
                    markup,
                    width,
                    height,
                } => match request.svg_drawer.import(markup, doc) {
                    Ok(xobj_id) => {
                        figures.insert(
                            *id,
                            Figure {
                                xobj_id,
                                px_width: *width,
                                px_height: *height,
                            },
                        );
                    }
                    Err(e) => self.diag(Level::Warn, format_args!("Skipping inline SVG: {e}")),
                },
                Block::Text(_) | Block::Rule => {}
            }
        }
        figures
    }

    fn import_raster(
        &self,
        bytes: &[u8],
        doc: &mut PdfDocument,
    ) -> std::result::Result<Figure, String> {
        // Decode with the `image` crate to obtain pixel dimensions.
        let dyn_img = ::image::load_from_memory(bytes).map_err(|e| format!("decode error: {e}"))?;
        let (px_width, px_height) = (dyn_img.width() as f32, dyn_img.height() as f32);

        let mut warnings = Vec::new();
        let raw = RawImage::decode_from_bytes(bytes, &mut warnings)
            .map_err(|e| format!("PDF encode error: {e}"))?;
        Ok(Figure {
            xobj_id: doc.add_image(&raw),
            px_width,
            px_height,
        })
    }

    fn import_svg_resource(
        &self,
        bytes: &[u8],
        request: &ConversionRequest,
        doc: &mut PdfDocument,
    ) -> std::result::Result<Figure, String> {
        let markup = String::from_utf8_lossy(bytes);
        let (px_width, px_height) = parse_xhtml(&markup)
            .map(|svg| declared_size(&svg.root))
            .unwrap_or(DEFAULT_SVG_SIZE);
        Ok(Figure {
            xobj_id: request.svg_drawer.import(&markup, doc)?,
            px_width,
            px_height,
        })
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, request: &ConversionRequest, sink: &mut dyn Write) -> Result<()> {
        let (document, base_uri) = self.load_document(&request.source)?;
        self.diag(Level::Debug, format_args!("Rendering with base URI {base_uri}"));

        let title = document
            .title()
            .or_else(|| {
                request
                    .input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let producer = format!("htmlpdf {}", env!("CARGO_PKG_VERSION"));
        let mut doc = PdfDocument::new(&title);
        doc.metadata.info.creator = producer.clone();
        doc.metadata.info.producer = producer.clone();
        let accessible = request.conformance == ConformanceMode::PdfUaPdfA3u;
        if accessible {
            if document.title().is_none() {
                self.diag(
                    Level::Warn,
                    format_args!("PDF/UA documents should declare a <title>; using '{title}'"),
                );
            }
            if document.language().is_none() {
                self.diag(
                    Level::Warn,
                    format_args!("PDF/UA documents should declare a language on <html>"),
                );
            }
            if request.fonts.is_empty() {
                self.diag(
                    Level::Warn,
                    format_args!("PDF/A requires embedded fonts; register one with --font"),
                );
            }
            doc.metadata.info.conformance = conformance::printpdf_conformance();
        }

        let (fonts, font_ids) = self.load_fonts(request, &mut doc)?;

        let blocks = collect_blocks(document.body());
        let loader = ResourceLoader::new(&request.resources, Some(&base_uri));
        let figures = self.load_figures(&blocks, request, &loader, &mut doc);

        let content_width = self.geometry.content_width();
        let mut sizes = HashMap::new();
        for block in &blocks {
            let (id, declared) = match block {
                Block::Image { id, width, height, .. } => (*id, (*width, *height)),
                Block::Svg { id, width, height, .. } => (*id, (Some(*width), Some(*height))),
                Block::Text(_) | Block::Rule => continue,
            };
            if let Some(fig) = figures.get(&id) {
                let intrinsic = (fig.px_width, fig.px_height);
                sizes.insert(id, fit_figure(declared, intrinsic, content_width));
            }
        }

        let layout = paginate(&blocks, &sizes, self.geometry, &fonts);
        self.diag(Level::Info, format_args!("Laid out {} page(s)", layout.pages.len()));

        let pages = emit_pages(&layout, &fonts, &font_ids, &figures);
        doc.with_pages(pages);

        let options = PdfSaveOptions {
            subset_fonts: !request.fast_mode,
            ..PdfSaveOptions::default()
        };
        let mut warnings = Vec::new();
        let mut bytes = doc.save(&options, &mut warnings);
        for w in &warnings {
            self.diag(Level::Debug, format_args!("printpdf: {w:?}"));
        }
        if accessible {
            let meta = AccessibleMetadata {
                title: &title,
                language: document.language(),
                producer: &producer,
            };
            bytes = conformance::finish_accessible(&bytes, &meta).map_err(Error::Render)?;
        }

        sink.write_all(&bytes)
            .map_err(|e| Error::Render(format!("failed to write PDF stream: {e}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Page content
// ---------------------------------------------------------------------------

fn emit_pages(
    layout: &DocumentLayout,
    fonts: &FontManager,
    font_ids: &HashMap<FontKey, FontId>,
    figures: &HashMap<usize, Figure>,
) -> Vec<PdfPage> {
    let page_w = Mm(layout.geometry.width * 0.352778); // pt → mm
    let page_h = Mm(layout.geometry.height * 0.352778);

    layout
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for lbox in &page.boxes {
                render_box(&mut ops, lbox, layout.geometry.height, fonts, font_ids, figures);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect()
}

fn black() -> Color {
    Color::Rgb(Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        icc_profile: None,
    })
}

/// Text drawing through either an embedded face or a builtin Helvetica.
enum Face {
    Embedded(FontId),
    Builtin(BuiltinFont),
}

impl Face {
    fn pick(fonts: &FontManager, font_ids: &HashMap<FontKey, FontId>, bold: bool) -> Self {
        match fonts.select(bold).and_then(|k| font_ids.get(k)) {
            Some(id) => Face::Embedded(id.clone()),
            None if bold => Face::Builtin(BuiltinFont::HelveticaBold),
            None => Face::Builtin(BuiltinFont::Helvetica),
        }
    }

    fn write(&self, ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, line_height: f32) {
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(x), y: Pt(y) },
        });
        match self {
            Face::Embedded(id) => ops.push(Op::SetFontSize {
                size: Pt(size),
                font: id.clone(),
            }),
            Face::Builtin(font) => ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font: *font,
            }),
        }
        ops.push(Op::SetLineHeight { lh: Pt(line_height) });
        ops.push(Op::SetFillColor { col: black() });
        match self {
            Face::Embedded(id) => ops.push(Op::WriteText {
                items: vec![TextItem::Text(text.to_string())],
                font: id.clone(),
            }),
            Face::Builtin(font) => ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winlatin(text))],
                font: *font,
            }),
        }
        ops.push(Op::EndTextSection);
    }
}

/// Render one LayoutBox into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    fonts: &FontManager,
    font_ids: &HashMap<FontKey, FontId>,
    figures: &HashMap<usize, Figure>,
) {
    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = page_height - lbox.y;

    match &lbox.content {
        BoxContent::Text {
            lines,
            font_size,
            bold,
            line_height,
            marker,
        } => {
            let face = Face::pick(fonts, font_ids, *bold);
            let ascender = fonts.ascender_pt(*font_size, *bold);
            for (i, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let baseline = pdf_y - i as f32 * line_height - ascender;
                face.write(ops, line, lbox.x, baseline, *font_size, *line_height);
            }
            if let Some(marker) = marker {
                let marker_face = Face::pick(fonts, font_ids, false);
                let marker_x = lbox.x - 16.0;
                let baseline = pdf_y - ascender;
                marker_face.write(ops, marker, marker_x, baseline, *font_size, *line_height);
            }
        }
        BoxContent::Rule => {
            ops.push(Op::SetOutlineColor { col: black() });
            ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![
                        LinePoint {
                            p: Point { x: Pt(lbox.x), y: Pt(pdf_y) },
                            bezier: false,
                        },
                        LinePoint {
                            p: Point {
                                x: Pt(lbox.x + lbox.width),
                                y: Pt(pdf_y),
                            },
                            bezier: false,
                        },
                    ],
                    is_closed: false,
                },
            });
        }
        BoxContent::Figure { id } => {
            let Some(fig) = figures.get(id) else {
                return;
            };
            // translate_y = bottom edge of the figure in PDF coordinates.
            let bottom_y = pdf_y - lbox.height;

            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if fig.px_width > 0.0 { lbox.width / fig.px_width } else { 1.0 };
            let scale_y = if fig.px_height > 0.0 { lbox.height / fig.px_height } else { 1.0 };

            ops.push(Op::UseXobject {
                id: fig.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(bottom_y)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for the 0x80-0xFF range; printpdf
    // passes these bytes straight to the PDF stream, decoded by
    // WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}
