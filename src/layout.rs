//! Flow layout – flattens the document body into blocks, wraps text and
//! splits the result into pages.
//!
//! Single-column flow. Block elements stack vertically and inline content
//! is flowed into paragraphs. Images and inline SVG are placed at their
//! fitted size.

use std::collections::HashMap;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{wrap_text, FontManager};
use crate::svg::{declared_size, parse_length};

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;
/// Body text size in points.
pub const BASE_FONT_SIZE: f32 = 12.0;
pub const LINE_HEIGHT_FACTOR: f32 = 1.4;
const LIST_INDENT_PT: f32 = 24.0;
const CELL_SEPARATOR: &str = "  |  ";

/// Page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    /// A4 portrait: 210mm × 297mm = 595.28 × 841.89 points.
    fn default() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            margin: PAGE_MARGIN_PT,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn content_bottom(&self) -> f32 {
        self.height - self.margin
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// A run of flowed text sharing one style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
    pub indent: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// List bullet/number prefix (e.g. "•" or "1.")
    pub marker: Option<String>,
}

/// A block-level unit of content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(TextBlock),
    /// Horizontal rule.
    Rule,
    Image {
        id: usize,
        src: String,
        width: Option<f32>,
        height: Option<f32>,
        alt: Option<String>,
    },
    Svg {
        id: usize,
        markup: String,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone)]
struct Ctx {
    font_size: f32,
    bold: bool,
    /// Inside `<strong>`/`<b>` or a header cell.
    emphasis: bool,
    indent: f32,
    preformatted: bool,
    margin_top: f32,
    margin_bottom: f32,
}

impl Default for Ctx {
    fn default() -> Self {
        Self {
            font_size: BASE_FONT_SIZE,
            bold: false,
            emphasis: false,
            indent: 0.0,
            preformatted: false,
            margin_top: 0.0,
            margin_bottom: 8.0,
        }
    }
}

#[derive(Default)]
struct Collector {
    blocks: Vec<Block>,
    text: String,
    style: Option<Ctx>,
    marker: Option<String>,
    /// Words of the pending text set with and without emphasis.
    emphasized_words: usize,
    plain_words: usize,
    next_id: usize,
}

impl Collector {
    fn push_text(&mut self, s: &str, ctx: &Ctx) {
        let words = s.split_whitespace().count();
        if ctx.emphasis {
            self.emphasized_words += words;
        } else {
            self.plain_words += words;
        }
        if ctx.preformatted {
            if s.is_empty() {
                return;
            }
            self.style.get_or_insert_with(|| ctx.clone());
            self.text.push_str(s);
            return;
        }

        if s.trim().is_empty() && self.text.is_empty() {
            return;
        }
        self.style.get_or_insert_with(|| ctx.clone());
        let leading = s.starts_with(char::is_whitespace);
        let trailing = s.ends_with(char::is_whitespace);
        if leading && !self.text.is_empty() && !self.text.ends_with([' ', '\n']) {
            self.text.push(' ');
        }
        let words: Vec<&str> = s.split_whitespace().collect();
        self.text.push_str(&words.join(" "));
        if trailing && !words.is_empty() {
            self.text.push(' ');
        }
    }

    fn line_break(&mut self, ctx: &Ctx) {
        self.style.get_or_insert_with(|| ctx.clone());
        while self.text.ends_with(' ') {
            self.text.pop();
        }
        self.text.push('\n');
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.text);
        let style = self.style.take();
        let all_emphasized = self.plain_words == 0 && self.emphasized_words > 0;
        self.plain_words = 0;
        self.emphasized_words = 0;
        let text = if style.as_ref().is_some_and(|s| s.preformatted) {
            text.trim_end_matches('\n').to_string()
        } else {
            text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
        };
        if text.trim().is_empty() && self.marker.is_none() {
            return;
        }
        let style = style.unwrap_or_default();
        self.blocks.push(Block::Text(TextBlock {
            text,
            font_size: style.font_size,
            bold: style.bold || all_emphasized,
            indent: style.indent,
            margin_top: style.margin_top,
            margin_bottom: style.margin_bottom,
            marker: self.marker.take(),
        }));
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }

    fn walk(&mut self, elem: &ElementNode, ctx: &Ctx) {
        let tag = elem.tag();
        match tag {
            Tag::Hidden | Tag::Head | Tag::Title => {}
            Tag::Br => self.line_break(ctx),
            Tag::Hr => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            Tag::Img => {
                self.flush();
                if let Some(src) = elem.src() {
                    let id = self.next_id();
                    self.blocks.push(Block::Image {
                        id,
                        src: src.to_string(),
                        width: elem.attr("width").and_then(parse_length),
                        height: elem.attr("height").and_then(parse_length),
                        alt: elem.attr("alt").map(str::to_string).filter(|a| !a.trim().is_empty()),
                    });
                }
            }
            Tag::Svg => {
                self.flush();
                let (width, height) = declared_size(elem);
                let id = self.next_id();
                self.blocks.push(Block::Svg {
                    id,
                    markup: elem.to_xml(),
                    width,
                    height,
                });
            }
            Tag::Span => self.walk_children(elem, ctx),
            // Text runs share one face per block, so a block is set bold
            // only when every word in it is emphasized.
            Tag::Strong => {
                let inner = Ctx {
                    emphasis: true,
                    ..ctx.clone()
                };
                self.walk_children(elem, &inner);
            }
            Tag::Td | Tag::Th => {
                if !self.text.is_empty() {
                    self.text.push_str(CELL_SEPARATOR);
                }
                let inner = Ctx {
                    emphasis: ctx.emphasis || tag == Tag::Th,
                    ..ctx.clone()
                };
                self.walk_children(elem, &inner);
            }
            Tag::Ul | Tag::Ol => {
                self.flush();
                let inner = Ctx {
                    indent: ctx.indent + LIST_INDENT_PT,
                    margin_bottom: 4.0,
                    ..ctx.clone()
                };
                let mut n = 0;
                for child in &elem.children {
                    match child {
                        DomNode::Element(li) if li.tag() == Tag::Li => {
                            n += 1;
                            self.flush();
                            self.marker = Some(if tag == Tag::Ol {
                                format!("{n}.")
                            } else {
                                "\u{2022}".to_string()
                            });
                            self.walk_children(li, &inner);
                            self.flush();
                        }
                        DomNode::Element(other) => self.walk(other, &inner),
                        DomNode::Text(t) => self.push_text(t, &inner),
                    }
                }
                self.flush();
            }
            _ => {
                self.flush();
                let inner = block_ctx(&tag, ctx);
                self.walk_children(elem, &inner);
                self.flush();
            }
        }
    }

    fn walk_children(&mut self, elem: &ElementNode, ctx: &Ctx) {
        for child in &elem.children {
            match child {
                DomNode::Element(e) => self.walk(e, ctx),
                DomNode::Text(t) => self.push_text(t, ctx),
            }
        }
    }
}

/// Default styles based on tag semantics.
fn block_ctx(tag: &Tag, parent: &Ctx) -> Ctx {
    let mut s = Ctx {
        margin_top: 0.0,
        margin_bottom: 8.0,
        ..parent.clone()
    };
    if let Some(level) = tag.heading_level() {
        s.font_size = match level {
            1 => 24.0,
            2 => 18.0,
            3 => 15.0,
            4 => 13.0,
            _ => BASE_FONT_SIZE,
        };
        s.bold = true;
        s.margin_top = 12.0;
        s.margin_bottom = 8.0;
        return s;
    }
    match tag {
        Tag::Pre => {
            s.preformatted = true;
            s.font_size = BASE_FONT_SIZE - 2.0;
        }
        Tag::Blockquote => s.indent += LIST_INDENT_PT,
        Tag::Tr => s.margin_bottom = 2.0,
        _ => {}
    }
    s
}

/// Flatten a body element into layout blocks, in document order.
pub fn collect_blocks(body: &ElementNode) -> Vec<Block> {
    let mut collector = Collector::default();
    collector.walk(body, &Ctx::default());
    collector.flush();
    collector.blocks
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Positioned content, origin at the top-left of the page, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: BoxContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    Text {
        lines: Vec<String>,
        font_size: f32,
        bold: bool,
        line_height: f32,
        marker: Option<String>,
    },
    Rule,
    /// A placed image or SVG, by block id.
    Figure { id: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub boxes: Vec<LayoutBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub geometry: PageGeometry,
    /// Never empty.
    pub pages: Vec<PageLayout>,
}

/// Fit a replaced element: declared sizes win, a single declared side keeps
/// the intrinsic aspect ratio, and the result never exceeds `max_width`.
pub fn fit_figure(
    declared: (Option<f32>, Option<f32>),
    intrinsic: (f32, f32),
    max_width: f32,
) -> (f32, f32) {
    let (iw, ih) = (intrinsic.0.max(1.0), intrinsic.1.max(1.0));
    let (w, h) = match declared {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w * ih / iw),
        (None, Some(h)) => (h * iw / ih, h),
        (None, None) => (iw, ih),
    };
    if w > max_width {
        (max_width, h * max_width / w)
    } else {
        (w, h)
    }
}

struct Paginator<'a> {
    geometry: PageGeometry,
    fonts: &'a FontManager,
    pages: Vec<PageLayout>,
    current: PageLayout,
    y: f32,
}

impl<'a> Paginator<'a> {
    fn at_top(&self) -> bool {
        self.current.boxes.is_empty()
    }

    fn remaining(&self) -> f32 {
        self.geometry.content_bottom() - self.y
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = self.geometry.margin;
    }

    fn place_text(&mut self, block: &TextBlock) {
        let line_height = block.font_size * LINE_HEIGHT_FACTOR;
        let width = self.geometry.content_width() - block.indent;
        let mut lines = wrap_text(&block.text, block.font_size, block.bold, width, self.fonts);
        let mut marker = block.marker.clone();

        if !self.at_top() {
            self.y += block.margin_top;
        }
        while !lines.is_empty() {
            let capacity = (self.remaining() / line_height).floor().max(0.0) as usize;
            if capacity == 0 {
                if self.at_top() {
                    // Page cannot hold a single line; place one anyway.
                    self.push_lines(&mut lines, 1, block, line_height, width, &mut marker);
                    continue;
                }
                self.new_page();
                continue;
            }
            let take = capacity.min(lines.len());
            self.push_lines(&mut lines, take, block, line_height, width, &mut marker);
        }
        self.y += block.margin_bottom;
    }

    fn push_lines(
        &mut self,
        lines: &mut Vec<String>,
        take: usize,
        block: &TextBlock,
        line_height: f32,
        width: f32,
        marker: &mut Option<String>,
    ) {
        let chunk: Vec<String> = lines.drain(..take).collect();
        let height = chunk.len() as f32 * line_height;
        self.current.boxes.push(LayoutBox {
            x: self.geometry.margin + block.indent,
            y: self.y,
            width,
            height,
            content: BoxContent::Text {
                lines: chunk,
                font_size: block.font_size,
                bold: block.bold,
                line_height,
                marker: marker.take(),
            },
        });
        self.y += height;
    }

    fn place_figure(&mut self, id: usize, width: f32, height: f32) {
        let max_height = self.geometry.height - 2.0 * self.geometry.margin;
        let (width, height) = if height > max_height {
            (width * max_height / height, max_height)
        } else {
            (width, height)
        };
        if height > self.remaining() && !self.at_top() {
            self.new_page();
        }
        self.current.boxes.push(LayoutBox {
            x: self.geometry.margin,
            y: self.y,
            width,
            height,
            content: BoxContent::Figure { id },
        });
        self.y += height + 8.0;
    }

    fn place_rule(&mut self) {
        if self.remaining() < 8.0 && !self.at_top() {
            self.new_page();
        }
        self.y += 4.0;
        self.current.boxes.push(LayoutBox {
            x: self.geometry.margin,
            y: self.y,
            width: self.geometry.content_width(),
            height: 0.0,
            content: BoxContent::Rule,
        });
        self.y += 8.0;
    }
}

/// Lay out blocks onto pages. `figures` maps image/SVG block ids to their
/// fitted size; blocks without an entry (blocked or failed resources) are
/// replaced by their alt text, if any.
pub fn paginate(
    blocks: &[Block],
    figures: &HashMap<usize, (f32, f32)>,
    geometry: PageGeometry,
    fonts: &FontManager,
) -> DocumentLayout {
    let mut p = Paginator {
        geometry,
        fonts,
        pages: Vec::new(),
        current: PageLayout::default(),
        y: geometry.margin,
    };

    for block in blocks {
        match block {
            Block::Text(text) => p.place_text(text),
            Block::Rule => p.place_rule(),
            Block::Image { id, alt, .. } => match (figures.get(id), alt) {
                (Some(&(w, h)), _) => p.place_figure(*id, w, h),
                (None, Some(alt)) => p.place_text(&TextBlock {
                    text: alt.clone(),
                    font_size: BASE_FONT_SIZE,
                    bold: false,
                    indent: 0.0,
                    margin_top: 0.0,
                    margin_bottom: 8.0,
                    marker: None,
                }),
                (None, None) => {}
            },
            Block::Svg { id, .. } => {
                if let Some(&(w, h)) = figures.get(id) {
                    p.place_figure(*id, w, h);
                }
            }
        }
    }

    if !p.current.boxes.is_empty() || p.pages.is_empty() {
        p.pages.push(p.current);
    }
    DocumentLayout {
        geometry,
        pages: p.pages,
    }
}
