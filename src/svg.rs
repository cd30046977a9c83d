//! SVG drawing capability.

use printpdf::{PdfDocument, Svg, XObjectId};

use crate::dom::ElementNode;

/// Turns SVG markup into a reusable PDF form XObject.
pub trait SvgDrawer {
    fn import(&self, markup: &str, doc: &mut PdfDocument) -> Result<XObjectId, String>;
}

/// Vector SVG import through `printpdf`'s SVG support.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintpdfSvgDrawer;

impl SvgDrawer for PrintpdfSvgDrawer {
    fn import(&self, markup: &str, doc: &mut PdfDocument) -> Result<XObjectId, String> {
        let mut warnings = Vec::new();
        let xobject = Svg::parse(markup, &mut warnings)?;
        for w in &warnings {
            log::debug!("SVG import: {w:?}");
        }
        Ok(doc.add_xobject(&xobject))
    }
}

/// Default replaced-element size for SVG without usable dimensions.
pub const DEFAULT_SVG_SIZE: (f32, f32) = (300.0, 150.0);

/// Declared size of an `<svg>` root. Lengths are laid out one px per point.
pub fn declared_size(svg: &ElementNode) -> (f32, f32) {
    let from_view_box = svg.attr("viewBox").and_then(|vb| {
        let nums: Vec<f32> = vb
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        match nums.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
            _ => None,
        }
    });
    let width = svg.attr("width").and_then(parse_length);
    let height = svg.attr("height").and_then(parse_length);
    match (width, height, from_view_box) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((vw, vh))) => (h * vw / vh, h),
        (None, None, Some(size)) => size,
        (Some(w), None, None) => (w, DEFAULT_SVG_SIZE.1),
        (None, Some(h), None) => (DEFAULT_SVG_SIZE.0, h),
        (None, None, None) => DEFAULT_SVG_SIZE,
    }
}

/// Parse an absolute length (`12`, `12px`, `12pt`). Percentages and
/// relative units are not lengths here.
pub fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let num = value
        .strip_suffix("px")
        .or_else(|| value.strip_suffix("pt"))
        .unwrap_or(value);
    num.trim().parse::<f32>().ok().filter(|v| *v > 0.0)
}
