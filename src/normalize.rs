//! Document normalization – turns the input file into something the
//! renderer accepts.
//!
//! HTML input is parsed with the html5ever tree builder (via `scraper`),
//! which recovers from malformed markup the way browsers do, and is then
//! copied into a [`StrictDocument`]. Input declared as XHTML is handed to
//! the renderer untouched and parsed there as well-formed XML by
//! [`parse_xhtml`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{ElementRef, Html, Node};
use url::Url;

use crate::dom::{DomNode, ElementNode, QualifiedName, StrictDocument};
use crate::error::{Error, Result};

/// Character encoding of the raw input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
}

/// Turns raw markup into a strict document tree.
pub trait Normalizer {
    fn normalize(
        &self,
        bytes: &[u8],
        encoding: Encoding,
    ) -> std::result::Result<StrictDocument, String>;
}

/// Forgiving HTML5 normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlNormalizer;

impl Normalizer for HtmlNormalizer {
    fn normalize(
        &self,
        bytes: &[u8],
        encoding: Encoding,
    ) -> std::result::Result<StrictDocument, String> {
        let text = decode(bytes, encoding);
        let html = Html::parse_document(&text);
        for err in &html.errors {
            log::debug!("HTML parse error (recovered): {err}");
        }
        Ok(StrictDocument::new(convert_element(html.root_element())))
    }
}

fn decode(bytes: &[u8], encoding: Encoding) -> Cow<'_, str> {
    match encoding {
        Encoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8_lossy(bytes)
        }
    }
}

fn convert_element(elem: ElementRef<'_>) -> ElementNode {
    let value = elem.value();
    let mut node = ElementNode::new(QualifiedName {
        namespace: value.name.ns.to_string(),
        prefix: value.name.prefix.as_ref().map(|p| p.to_string()),
        local: value.name.local.to_string(),
    });
    node.attributes = value
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for child in elem.children() {
        match child.value() {
            Node::Text(t) => {
                let text: &str = &t.text;
                match node.children.last_mut() {
                    Some(DomNode::Text(prev)) => prev.push_str(text),
                    _ => node.children.push(DomNode::Text(text.to_string())),
                }
            }
            Node::Element(_) => {
                if let Some(child_elem) = ElementRef::wrap(child) {
                    node.children.push(DomNode::Element(convert_element(child_elem)));
                }
            }
            _ => {}
        }
    }
    node
}

// ---------------------------------------------------------------------------
// Strict XHTML
// ---------------------------------------------------------------------------

/// Named entities accepted in XHTML input beyond the five XML ones.
fn xhtml_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{00A0}",
        "copy" => "\u{00A9}",
        "reg" => "\u{00AE}",
        "trade" => "\u{2122}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "laquo" => "\u{00AB}",
        "raquo" => "\u{00BB}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "bull" => "\u{2022}",
        "middot" => "\u{00B7}",
        "euro" => "\u{20AC}",
        "deg" => "\u{00B0}",
        "times" => "\u{00D7}",
        _ => return None,
    })
}

type Scope = HashMap<String, String>;

/// Parse well-formed XHTML into a strict document. Mismatched or unclosed
/// tags, unknown entities and stray content are errors.
pub fn parse_xhtml(text: &str) -> std::result::Result<StrictDocument, String> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<(ElementNode, Scope)> = Vec::new();
    let mut root: Option<ElementNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed XHTML at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let parent_scope = stack.last().map(|(_, s)| s);
                let (elem, scope) = start_element(&e, parent_scope)?;
                stack.push((elem, scope));
            }
            Event::Empty(e) => {
                let parent_scope = stack.last().map(|(_, s)| s);
                let (elem, _) = start_element(&e, parent_scope)?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::End(_) => {
                let (elem, _) = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Text(e) => {
                let content = e
                    .unescape_with(xhtml_entity)
                    .map_err(|e| format!("malformed XHTML text: {e}"))?;
                push_text(&mut stack, &content)?;
            }
            Event::CData(e) => {
                let content = String::from_utf8_lossy(&e).into_owned();
                push_text(&mut stack, &content)?;
            }
            Event::Eof => break,
            // Comments, processing instructions, declarations, doctype.
            _ => {}
        }
    }

    if let Some((elem, _)) = stack.last() {
        return Err(format!("unclosed element <{}>", elem.name.qualified()));
    }
    root.map(StrictDocument::new)
        .ok_or_else(|| "document has no root element".to_string())
}

fn start_element(
    e: &BytesStart<'_>,
    parent_scope: Option<&Scope>,
) -> std::result::Result<(ElementNode, Scope), String> {
    let mut scope = parent_scope.cloned().unwrap_or_default();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| format!("malformed attribute: {e}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(xhtml_entity)
            .map_err(|e| format!("malformed attribute value: {e}"))?
            .into_owned();
        if key == "xmlns" {
            scope.insert(String::new(), value.clone());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value.clone());
        }
        attributes.push((key, value));
    }

    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = match raw_name.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, raw_name),
    };
    let namespace = match &prefix {
        Some(p) => scope
            .get(p)
            .cloned()
            .ok_or_else(|| format!("undeclared namespace prefix '{p}'"))?,
        None => scope.get("").cloned().unwrap_or_default(),
    };

    let mut elem = ElementNode::new(QualifiedName {
        namespace,
        prefix,
        local,
    });
    elem.attributes = attributes;
    Ok((elem, scope))
}

fn attach(
    stack: &mut [(ElementNode, Scope)],
    root: &mut Option<ElementNode>,
    elem: ElementNode,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(DomNode::Element(elem)),
        None if root.is_none() => *root = Some(elem),
        None => return Err("document has more than one root element".to_string()),
    }
    Ok(())
}

fn push_text(stack: &mut [(ElementNode, Scope)], text: &str) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some((parent, _)) => {
            match parent.children.last_mut() {
                Some(DomNode::Text(prev)) => prev.push_str(text),
                _ => parent.children.push(DomNode::Text(text.to_string())),
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text outside the root element".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Document source
// ---------------------------------------------------------------------------

/// What the renderer is given to render.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A normalized tree plus the base URI for relative references.
    Tree { document: StrictDocument, base_uri: Url },
    /// A strict XHTML file, parsed by the renderer, which also derives the
    /// base URI from its location.
    File(PathBuf),
}

/// Build the document source for `input`.
pub fn prepare_source(
    input: &Path,
    xhtml: bool,
    base: Option<&str>,
    normalizer: &dyn Normalizer,
) -> Result<DocumentSource> {
    if xhtml {
        if base.is_some() {
            log::warn!("--base is ignored for XHTML input; the file location is used");
        }
        return Ok(DocumentSource::File(input.to_path_buf()));
    }

    let bytes = std::fs::read(input).map_err(|e| Error::Parse {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;
    let document = normalizer
        .normalize(&bytes, Encoding::Utf8)
        .map_err(|reason| Error::Parse {
            path: input.to_path_buf(),
            reason,
        })?;
    let base_uri = base_uri_for(input, base)?;
    log::debug!("Normalized '{}' with base URI {base_uri}", input.display());
    Ok(DocumentSource::Tree { document, base_uri })
}

/// Base URI for a normalized document: the override path when given, else
/// the input file itself.
pub fn base_uri_for(input: &Path, base: Option<&str>) -> Result<Url> {
    match base {
        Some(base) => {
            let path = absolute_normalized(Path::new(base))?;
            let url = if path.is_dir() {
                Url::from_directory_path(&path)
            } else {
                Url::from_file_path(&path)
            };
            url.map_err(|()| Error::Config(format!("cannot convert '{base}' to a file URI")))
        }
        None => {
            let path = absolute_normalized(input)?;
            Url::from_file_path(&path).map_err(|()| {
                Error::Config(format!("cannot convert '{}' to a file URI", input.display()))
            })
        }
    }
}

/// Absolute form of `path` with `.` and `..` folded lexically.
pub fn absolute_normalized(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path)
        .map_err(|e| Error::Config(format!("cannot resolve '{}': {e}", path.display())))?;
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Tag, SVG_NS, XHTML_NS};

    #[test]
    fn html_is_normalized_into_xhtml_namespace() {
        let doc = HtmlNormalizer
            .normalize(b"<title>T</title><p>one<p>two <b>bold", Encoding::Utf8)
            .unwrap();
        assert_eq!(doc.root.name, QualifiedName::xhtml("html"));
        assert_eq!(doc.title().as_deref(), Some("T"));
        let paragraphs: Vec<_> = doc.body().elements().filter(|e| e.tag() == Tag::P).collect();
        assert_eq!(paragraphs.len(), 2, "unclosed <p> must be split");
        assert_eq!(paragraphs[1].text_content(), "two bold");
    }

    #[test]
    fn inline_svg_gets_svg_namespace() {
        let doc = HtmlNormalizer
            .normalize(b"<body><svg width='10' height='10'><rect/></svg></body>", Encoding::Utf8)
            .unwrap();
        let svg = doc.body().elements().next().unwrap();
        assert_eq!(svg.name.namespace, SVG_NS);
        assert_eq!(svg.tag(), Tag::Svg);
        assert_eq!(svg.elements().next().unwrap().name.namespace, SVG_NS);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let doc = HtmlNormalizer
            .normalize(b"<p>caf\xE9</p>", Encoding::Utf8)
            .unwrap();
        assert!(doc.body().text_content().contains('\u{FFFD}'));
    }

    #[test]
    fn xhtml_parses_with_namespaces() {
        let doc = parse_xhtml(concat!(
            "<?xml version=\"1.0\"?>",
            "<!DOCTYPE html>",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:s=\"http://www.w3.org/2000/svg\">",
            "<head><title>X</title></head>",
            "<body><p>a&amp;b&nbsp;c</p><s:svg width=\"5\"/></body></html>"
        ))
        .unwrap();
        assert_eq!(doc.root.name.namespace, XHTML_NS);
        assert_eq!(doc.title().as_deref(), Some("X"));
        let body = doc.body();
        let mut children = body.elements();
        assert_eq!(children.next().unwrap().text_content(), "a&b\u{00A0}c");
        let svg = children.next().unwrap();
        assert_eq!(svg.tag(), Tag::Svg);
        assert_eq!(svg.name.prefix.as_deref(), Some("s"));
    }

    #[test]
    fn xhtml_rejects_malformed_markup() {
        assert!(parse_xhtml("<html><body><p>unclosed</body></html>").is_err());
        assert!(parse_xhtml("<html><p>open").is_err());
        assert!(parse_xhtml("<a/><b/>").is_err());
        assert!(parse_xhtml("<x:a/>").is_err());
        assert!(parse_xhtml("").is_err());
    }

    #[test]
    fn base_uri_defaults_to_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        let url = base_uri_for(&input, None).unwrap();
        assert_eq!(url, Url::from_file_path(absolute_normalized(&input).unwrap()).unwrap());
        assert!(url.as_str().ends_with("/page.html"));
    }

    #[test]
    fn base_override_is_normalized_and_independent_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        let messy = format!("{}/./assets/../assets", dir.path().display());

        let a = base_uri_for(Path::new("one.html"), Some(&messy)).unwrap();
        let b = base_uri_for(Path::new("elsewhere/two.html"), Some(&messy)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Url::from_directory_path(absolute_normalized(&assets).unwrap()).unwrap());
        assert!(a.as_str().ends_with("/assets/"));
    }

    #[test]
    fn empty_base_is_a_config_error() {
        assert!(matches!(
            base_uri_for(Path::new("page.html"), Some("")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn unreadable_input_is_a_parse_error() {
        let err = prepare_source(Path::new("/no/such/input.html"), false, None, &HtmlNormalizer)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn xhtml_mode_skips_normalization() {
        let src = prepare_source(Path::new("/no/such/input.xhtml"), true, None, &HtmlNormalizer)
            .unwrap();
        assert!(matches!(src, DocumentSource::File(p) if p == Path::new("/no/such/input.xhtml")));
    }
}
