//! Strict document tree – a namespace-qualified, well-formed representation
//! of the input document.
//!
//! HTML input reaches this form through the normalizer; XHTML input is read
//! into it directly. The renderer only ever sees this tree.

use std::fmt::Write as _;

pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Namespace URI; empty when the element is in no namespace.
    pub namespace: String,
    pub prefix: Option<String>,
    pub local: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: None,
            local: local.into(),
        }
    }

    pub fn xhtml(local: impl Into<String>) -> Self {
        Self::new(XHTML_NS, local)
    }

    /// `prefix:local`, or `local` when unprefixed.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// The XHTML elements the renderer distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Body,
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Pre,
    Blockquote,
    Table,
    Tr,
    Td,
    Th,
    Hr,
    Br,
    Img,
    Span,
    Strong,
    /// `<script>`, `<style>`, `<template>` and friends: never rendered.
    Hidden,
    /// Inline `<svg>` root (SVG namespace).
    Svg,
    /// Catch-all for unknown tags – they are kept but treated as divs.
    Unknown(String),
}

impl Tag {
    pub fn of(name: &QualifiedName) -> Self {
        if name.namespace == SVG_NS && name.local == "svg" {
            return Tag::Svg;
        }
        if name.namespace != XHTML_NS {
            return Tag::Unknown(name.qualified());
        }
        match name.local.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "body" => Tag::Body,
            "div" | "section" | "article" | "header" | "footer" | "main" | "nav" | "aside"
            | "figure" | "figcaption" | "address" | "dl" | "dt" | "dd" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "table" | "thead" | "tbody" | "tfoot" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "hr" => Tag::Hr,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "strong" | "b" => Tag::Strong,
            "span" | "a" | "em" | "i" | "u" | "code" | "small" | "sub" | "sup" | "abbr"
            | "cite" | "q" | "mark" | "label" | "time" => Tag::Span,
            "script" | "style" | "template" | "noscript" | "meta" | "link" | "base" => {
                Tag::Hidden
            }
            other => Tag::Unknown(other.to_string()),
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::H1 => Some(1),
            Tag::H2 => Some(2),
            Tag::H3 => Some(3),
            Tag::H4 => Some(4),
            Tag::H5 => Some(5),
            Tag::H6 => Some(6),
            _ => None,
        }
    }
}

/// A node in the strict tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying its qualified name, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub name: QualifiedName,
    /// Attributes in document order, keyed by qualified attribute name.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::of(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }

    /// Concatenated descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serialize this subtree as well-formed XML, declaring namespaces where
    /// they change.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_element(self, "", &mut out);
        if uses_xlink(self) && self.attr("xmlns:xlink").is_none() {
            if let Some(pos) = out.find(|c: char| c == ' ' || c == '/' || c == '>') {
                out.insert_str(pos, &format!(" xmlns:xlink=\"{XLINK_NS}\""));
            }
        }
        out
    }
}

fn uses_xlink(elem: &ElementNode) -> bool {
    elem.attributes.iter().any(|(k, _)| k.starts_with("xlink:")) || elem.elements().any(uses_xlink)
}

fn collect_text(elem: &ElementNode, out: &mut String) {
    for child in &elem.children {
        match child {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(e, out),
        }
    }
}

fn write_element(elem: &ElementNode, parent_ns: &str, out: &mut String) {
    let name = elem.name.qualified();
    out.push('<');
    out.push_str(&name);
    let ns_attr = match &elem.name.prefix {
        Some(p) => format!("xmlns:{p}"),
        None => "xmlns".to_string(),
    };
    if elem.name.namespace != parent_ns && elem.attr(&ns_attr).is_none() {
        let _ = write!(out, " {ns_attr}=\"{}\"", escape(&elem.name.namespace, true));
    }
    for (k, v) in &elem.attributes {
        let _ = write!(out, " {k}=\"{}\"", escape(v, true));
    }
    if elem.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &elem.children {
        match child {
            DomNode::Text(t) => out.push_str(&escape(t, false)),
            DomNode::Element(e) => write_element(e, &elem.name.namespace, out),
        }
    }
    let _ = write!(out, "</{name}>");
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// A complete strict document.
#[derive(Debug, Clone, PartialEq)]
pub struct StrictDocument {
    pub root: ElementNode,
}

impl StrictDocument {
    pub fn new(root: ElementNode) -> Self {
        Self { root }
    }

    /// The `<head><title>` text, whitespace-collapsed.
    pub fn title(&self) -> Option<String> {
        let head = self.root.elements().find(|e| e.tag() == Tag::Head)?;
        let title = head.elements().find(|e| e.tag() == Tag::Title)?;
        let text = title.text_content().split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    }

    /// The `<body>` element, or the root when there is none.
    pub fn body(&self) -> &ElementNode {
        self.root
            .elements()
            .find(|e| e.tag() == Tag::Body)
            .unwrap_or(&self.root)
    }

    /// The document language from `<html lang>` / `xml:lang`.
    pub fn language(&self) -> Option<&str> {
        self.root.attr("lang").or_else(|| self.root.attr("xml:lang"))
    }
}
