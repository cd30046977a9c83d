//! Integration tests for the htmlpdf conversion front end.
//!
//! These tests validate:
//! - Converting HTML and XHTML inputs produces a valid PDF file
//! - Invalid font specifications fail before any output is created
//! - Output failures map to exit code 1
//! - Quiet mode, resource blocking and base overrides behave as documented

use std::path::{Path, PathBuf};

use base64::Engine;
use clap::Parser;
use log::LevelFilter;

use htmlpdf::app;
use htmlpdf::cli::{Cli, Command};
use htmlpdf::normalize::{DocumentSource, HtmlNormalizer};
use htmlpdf::request::build_request;
use htmlpdf::resources::ResourcePolicy;
use htmlpdf::{ConversionOptions, ConversionResult, PdfRenderer};

// =====================================================================
// Helper
// =====================================================================

/// 1×1 RGBA PNG.
const PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

struct Run {
    result: ConversionResult,
    stdout: String,
    stderr: String,
}

fn convert(args: &[&str]) -> Run {
    let mut argv = vec!["htmlpdf", "convert"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("arguments should parse");
    let Command::Convert(convert) = cli.command;
    let options = ConversionOptions::from(convert);

    let renderer = PdfRenderer::new(LevelFilter::Off);
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let result = app::run(&options, &renderer, &mut out, &mut err);
    Run {
        result,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err).unwrap(),
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

/// Number of image XObject streams in the PDF at `path`.
fn image_xobjects(path: &Path) -> usize {
    let doc = lopdf::Document::load(path).unwrap();
    doc.objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(lopdf::Object::as_name)
                .is_ok_and(|name| name == b"Image")
        })
        .count()
}

fn assert_valid_pdf(path: &Path) {
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Successful conversions
// =====================================================================

#[test]
fn converts_simple_html() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<html><body><p>Hi</p></body></html>");
    let output = dir.path().join("a.pdf");

    let run = convert(&["-i", s(&input), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 0, "stderr: {}", run.stderr);
    assert_valid_pdf(&output);
    assert!(run.stdout.contains("Attempting to convert '"));
    assert!(run.stdout.contains("a.pdf'"));
    assert!(run.stdout.contains("Successfully created PDF in "));
    assert!(run.stderr.is_empty());
}

#[test]
fn converts_accessible_xhtml() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "doc.xhtml",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="en">
  <head><title>Report</title></head>
  <body><h1>Report</h1><p>Body text &amp; more.</p></body>
</html>"#,
    );
    let output = dir.path().join("doc.pdf");

    let run = convert(&["-x", "-a", "-i", s(&input), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 0, "stderr: {}", run.stderr);
    assert_valid_pdf(&output);
    let bytes = std::fs::read(&output).unwrap();
    for marker in [
        "<pdfaid:part>3</pdfaid:part>",
        "<pdfaid:conformance>U</pdfaid:conformance>",
        "<pdfuaid:part>1</pdfuaid:part>",
        "/MarkInfo",
        "/StructTreeRoot",
    ] {
        assert!(contains(&bytes, marker), "missing {marker}");
    }
    let pdf = lopdf::Document::load_mem(&bytes).unwrap();
    let catalog = pdf.catalog().unwrap();
    assert_eq!(catalog.get(b"Lang").unwrap().as_str().unwrap(), b"en");

    let plain = dir.path().join("plain.pdf");
    let run = convert(&["-x", "-i", s(&input), "-o", s(&plain)]);
    assert!(run.result.success, "stderr: {}", run.stderr);
    let bytes = std::fs::read(&plain).unwrap();
    assert!(!contains(&bytes, "pdfaid"));
    assert!(!contains(&bytes, "/MarkInfo"));
}

#[test]
fn long_document_spans_pages() {
    let dir = tempfile::tempdir().unwrap();
    let body: String = (0..200)
        .map(|i| format!("<p>Paragraph number {i} of a long report.</p>"))
        .collect();
    let input = write(dir.path(), "long.html", &format!("<body>{body}</body>"));
    let output = dir.path().join("long.pdf");

    let run = convert(&["-q", "-i", s(&input), "-o", s(&output)]);

    assert!(run.result.success, "stderr: {}", run.stderr);
    assert_valid_pdf(&output);
}

#[test]
fn inline_data_image_and_svg_render() {
    let dir = tempfile::tempdir().unwrap();
    let html = format!(
        r#"<body><img src="data:image/png;base64,{PIXEL_PNG}" width="40" alt="px">
<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10"/></svg>
<hr><ul><li>one</li><li>two</li></ul></body>"#
    );
    let input = write(dir.path(), "img.html", &html);
    let output = dir.path().join("img.pdf");

    let run = convert(&["-i", s(&input), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 0, "stderr: {}", run.stderr);
    assert_valid_pdf(&output);
}

// =====================================================================
// Failures
// =====================================================================

#[test]
fn bad_font_spec_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<p>Hi</p>");
    let output = dir.path().join("a.pdf");

    let run = convert(&["-f", "Arial,400", "-i", s(&input), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 1);
    assert!(run.stderr.starts_with("Error: "));
    assert!(run.stderr.contains("Arial,400"));
    assert!(!run.stdout.contains("Successfully"));
    assert!(!output.exists());
}

#[test]
fn unwritable_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<p>Hi</p>");

    let run = convert(&["-i", s(&input), "-o", "/no/such/dir/out.pdf"]);

    assert_eq!(run.result.exit_code(), 1);
    assert!(run.stderr.contains("/no/such/dir/out.pdf"));
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("a.pdf");

    let run = convert(&["-i", s(&dir.path().join("absent.html")), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 1);
    assert!(run.stderr.contains("absent.html"));
}

#[test]
fn missing_font_file_fails_in_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<p>Hi</p>");
    let output = dir.path().join("a.pdf");
    let font = format!("Body,400,{}", s(&dir.path().join("missing.ttf")));

    let run = convert(&["-f", &font, "-i", s(&input), "-o", s(&output)]);

    assert_eq!(run.result.exit_code(), 1);
    assert!(run.stdout.contains("Loading font '"));
    assert!(run.stderr.contains("Rendering failed"));
}

// =====================================================================
// Flags
// =====================================================================

#[test]
fn quiet_suppresses_progress_but_not_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<p>Hi</p>");

    let ok = convert(&["-q", "-i", s(&input), "-o", s(&dir.path().join("a.pdf"))]);
    assert!(ok.result.success);
    assert!(ok.stdout.is_empty());

    let output = dir.path().join("b.pdf");
    let failed = convert(&["-q", "-f", "x", "-i", s(&input), "-o", s(&output)]);
    assert!(!failed.result.success);
    assert!(failed.stdout.is_empty());
    assert!(!failed.stderr.is_empty());
}

#[test]
fn verbose_overrides_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.html", "<p>Hi</p>");

    let run = convert(&["-q", "-v", "-i", s(&input), "-o", s(&dir.path().join("a.pdf"))]);

    assert!(run.result.success);
    assert!(run.stdout.contains("Successfully created PDF in "));
}

#[test]
fn block_mode_drops_images() {
    let dir = tempfile::tempdir().unwrap();
    let png = base64::engine::general_purpose::STANDARD.decode(PIXEL_PNG).unwrap();
    std::fs::write(dir.path().join("pixel.png"), png).unwrap();
    let input = write(
        dir.path(),
        "a.html",
        r#"<p>Logo:</p><img src="pixel.png" alt="Company logo">"#,
    );

    let blocked = dir.path().join("blocked.pdf");
    let run = convert(&["-b", "-i", s(&input), "-o", s(&blocked)]);
    assert!(run.result.success, "stderr: {}", run.stderr);
    assert_valid_pdf(&blocked);
    assert_eq!(image_xobjects(&blocked), 0);

    let open = dir.path().join("open.pdf");
    let run = convert(&["-i", s(&input), "-o", s(&open)]);
    assert!(run.result.success, "stderr: {}", run.stderr);
    assert!(image_xobjects(&open) > 0);
}

#[test]
fn base_override_becomes_directory_uri() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir(&assets).unwrap();
    let png = base64::engine::general_purpose::STANDARD.decode(PIXEL_PNG).unwrap();
    std::fs::write(assets.join("pixel.png"), png).unwrap();
    let input = write(dir.path(), "a.html", r#"<img src="pixel.png" width="30">"#);

    let mut options = ConversionOptions::new(&input, dir.path().join("a.pdf"));
    options.base = Some(s(&assets).to_string());
    let request = build_request(&options, &HtmlNormalizer).unwrap();
    assert_eq!(request.policy, ResourcePolicy::Unrestricted);
    match &request.source {
        DocumentSource::Tree { base_uri, .. } => {
            assert_eq!(base_uri.scheme(), "file");
            assert!(base_uri.path().ends_with("/assets/"));
            let pixel = base_uri.join("pixel.png").unwrap();
            assert!(pixel.path().ends_with("/assets/pixel.png"));
        }
        other => panic!("expected a normalized tree, got {other:?}"),
    }

    let output = dir.path().join("a.pdf");
    let run = convert(&["--base", s(&assets), "-i", s(&input), "-o", s(&output)]);
    assert!(run.result.success, "stderr: {}", run.stderr);
}

#[test]
fn clap_usage_errors_are_not_conversions() {
    assert!(Cli::try_parse_from(["htmlpdf", "convert", "-o", "out.pdf"]).is_err());
    assert!(Cli::try_parse_from(["htmlpdf", "--version"]).is_err());
}
