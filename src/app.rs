//! Top-level wiring for one `convert` invocation.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::normalize::{absolute_normalized, HtmlNormalizer};
use crate::options::ConversionOptions;
use crate::pipeline::{execute, ConversionResult};
use crate::render::Renderer;
use crate::request::build_request;

fn display_path(path: &Path) -> PathBuf {
    absolute_normalized(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Build and execute a conversion, writing progress to `stdout` and the
/// failure message (if any) to `stderr`.
pub fn run(
    options: &ConversionOptions,
    renderer: &dyn Renderer,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> ConversionResult {
    if options.verbosity().shows_progress() {
        let _ = writeln!(
            stdout,
            "Attempting to convert '{}' to PDF at '{}'",
            display_path(&options.input).display(),
            display_path(&options.output).display()
        );
    }

    let result = match build_request(options, &HtmlNormalizer) {
        Ok(request) => execute(request, &options.output, renderer, stdout),
        Err(e) => ConversionResult::failed(&e),
    };

    if let Some(message) = &result.error_message {
        let _ = writeln!(stderr, "Error: {message}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::request::ConversionRequest;

    struct Stub;

    impl Renderer for Stub {
        fn render(&self, _request: &ConversionRequest, sink: &mut dyn Write) -> Result<()> {
            sink.write_all(b"%PDF-stub").map_err(|e| Error::Render(e.to_string()))
        }
    }

    #[test]
    fn reports_attempt_and_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.html");
        std::fs::write(&input, "<p>hi</p>").unwrap();
        let opts = ConversionOptions::new(&input, dir.path().join("out.pdf"));

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = run(&opts, &Stub, &mut out, &mut err);

        assert_eq!(result.exit_code(), 0);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Attempting to convert '"));
        assert!(out.contains("in.html' to PDF at '"));
        assert!(out.contains("Successfully created PDF in "));
        assert!(err.is_empty());
    }

    #[test]
    fn bad_font_goes_to_stderr_and_leaves_output_alone() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.html");
        std::fs::write(&input, "<p>hi</p>").unwrap();
        let output = dir.path().join("out.pdf");
        let mut opts = ConversionOptions::new(&input, &output);
        opts.fonts = vec!["Arial,400".to_string()];
        opts.quiet = true;

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = run(&opts, &Stub, &mut out, &mut err);

        assert_eq!(result.exit_code(), 1);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Error: Invalid font specification: Arial,400\n"
        );
        assert!(!output.exists());
    }
}
