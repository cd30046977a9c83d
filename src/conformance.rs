//! PDF/UA-1 and PDF/A-3u identification for accessible output.
//!
//! printpdf lays down the pages, the embedded fonts and an ICC output
//! intent. [`finish_accessible`] reopens the saved file with `lopdf` and adds
//! what printpdf has no switch for: the XMP packet carrying the `pdfaid` and
//! `pdfuaid` identifiers, the catalog `/Lang`, `/MarkInfo`,
//! `/ViewerPreferences` and a document-level structure tree.

use lopdf::{dictionary, Document, Object, Stream};
use printpdf::{CustomPdfConformance, PdfConformance};
use quick_xml::escape::escape;

/// Conformance identifier written into the PDF.
pub const PDFA_IDENTIFIER: &str = "PDF/A-3u";

/// Document info entries that have no counterpart in the XMP packet and
/// would make the two disagree.
const UNMIRRORED_INFO_KEYS: [&[u8]; 8] = [
    b"GTS_PDFXVersion",
    b"CreationDate",
    b"ModDate",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Identifier",
    b"Trapped",
];

/// Metadata mirrored between the info dictionary and the XMP packet.
#[derive(Debug, Clone, Copy)]
pub struct AccessibleMetadata<'a> {
    pub title: &'a str,
    pub language: Option<&'a str>,
    /// Creator and producer string.
    pub producer: &'a str,
}

/// printpdf settings for accessible output: the ICC output intent is
/// embedded, and printpdf's own PDF/X XMP template is left out in favour of
/// the packet written by [`finish_accessible`].
pub fn printpdf_conformance() -> PdfConformance {
    PdfConformance::Custom(CustomPdfConformance {
        identifier: PDFA_IDENTIFIER.to_string(),
        requires_icc_profile: true,
        requires_xmp_metadata: false,
        allows_jpeg_content: true,
        ..CustomPdfConformance::default()
    })
}

/// Rewrite a printpdf-produced file as PDF/UA-1 + PDF/A-3u.
pub fn finish_accessible(pdf: &[u8], meta: &AccessibleMetadata<'_>) -> Result<Vec<u8>, String> {
    let mut doc = Document::load_mem(pdf).map_err(|e| format!("cannot reopen PDF: {e}"))?;
    doc.version = "1.7".to_string();

    // XMP streams stay uncompressed so the identifiers remain readable.
    let mut metadata = Stream::new(
        dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
        xmp_packet(meta).into_bytes(),
    );
    metadata.allows_compression = false;
    let metadata_id = doc.add_object(metadata);

    let tree_root_id = doc.new_object_id();
    let document_elem_id = doc.add_object(dictionary! {
        "Type" => "StructElem",
        "S" => "Document",
        "P" => tree_root_id,
    });
    doc.objects.insert(
        tree_root_id,
        Object::Dictionary(dictionary! {
            "Type" => "StructTreeRoot",
            "K" => document_elem_id,
        }),
    );

    if let Ok(info_id) = doc.trailer.get(b"Info").and_then(Object::as_reference) {
        if let Ok(info) = doc.get_dictionary_mut(info_id) {
            for key in UNMIRRORED_INFO_KEYS {
                info.remove(key);
            }
        }
    }

    let catalog = doc
        .catalog_mut()
        .map_err(|e| format!("PDF has no catalog: {e}"))?;
    catalog.set("Metadata", metadata_id);
    catalog.set("MarkInfo", dictionary! { "Marked" => true });
    catalog.set("ViewerPreferences", dictionary! { "DisplayDocTitle" => true });
    catalog.set("StructTreeRoot", tree_root_id);
    if let Some(lang) = meta.language {
        catalog.set("Lang", Object::string_literal(lang));
    }
    // printpdf labels its output intent for PDF/X.
    if let Ok(Object::Array(intents)) = catalog.get_mut(b"OutputIntents") {
        for intent in intents.iter_mut() {
            if let Object::Dictionary(intent) = intent {
                intent.set("S", "GTS_PDFA1");
            }
        }
    }

    let mut out = Vec::with_capacity(pdf.len() + 2048);
    doc.save_to(&mut out)
        .map_err(|e| format!("cannot write PDF: {e}"))?;
    Ok(out)
}

fn xmp_packet(meta: &AccessibleMetadata<'_>) -> String {
    let language = meta
        .language
        .map(|lang| {
            format!(
                "\n      <dc:language><rdf:Bag><rdf:li>{}</rdf:li></rdf:Bag></dc:language>",
                escape(lang)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xpacket begin="{bom}" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:dc="http://purl.org/dc/elements/1.1/"
        xmlns:pdf="http://ns.adobe.com/pdf/1.3/"
        xmlns:xmp="http://ns.adobe.com/xap/1.0/"
        xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/"
        xmlns:pdfuaid="http://www.aiim.org/pdfua/ns/id/">
      <dc:format>application/pdf</dc:format>
      <dc:title><rdf:Alt><rdf:li xml:lang="x-default">{title}</rdf:li></rdf:Alt></dc:title>{language}
      <xmp:CreatorTool>{producer}</xmp:CreatorTool>
      <pdf:Producer>{producer}</pdf:Producer>
      <pdfaid:part>3</pdfaid:part>
      <pdfaid:conformance>U</pdfaid:conformance>
      <pdfuaid:part>1</pdfuaid:part>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        bom = '\u{FEFF}',
        title = escape(meta.title),
        producer = escape(meta.producer),
    )
}
