//! Pipeline – runs a built [`ConversionRequest`] against a renderer and
//! reports the outcome.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::request::ConversionRequest;

/// Outcome of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub success: bool,
    /// Rendering time; zero when the conversion never reached the renderer.
    pub elapsed_millis: u64,
    pub error_message: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(elapsed_millis: u64) -> Self {
        Self {
            success: true,
            elapsed_millis,
            error_message: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            elapsed_millis: 0,
            error_message: Some(error.to_string()),
        }
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

/// Render `request` into a freshly created file at `output`, returning the
/// rendering time in milliseconds.
///
/// Progress lines go to `progress` unless the request is quiet. A failed
/// render leaves whatever was already written in place.
pub fn convert(
    request: ConversionRequest,
    output: &Path,
    renderer: &dyn Renderer,
    progress: &mut dyn Write,
) -> Result<u64> {
    let file = File::create(output).map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })?;
    let mut sink = BufWriter::new(file);

    let chatty = request.verbosity.shows_progress();
    if chatty {
        for font in &request.fonts {
            // Progress output is best-effort.
            let _ = writeln!(
                progress,
                "Loading font '{}' as '{}' (weight {})",
                font.source.display(),
                font.family,
                font.weight
            );
        }
    }

    let start = Instant::now();
    renderer.render(&request, &mut sink)?;
    sink.flush().map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })?;
    let elapsed = start.elapsed().as_millis() as u64;
    log::debug!("Rendered '{}' in {elapsed}ms", request.input.display());

    if chatty {
        let _ = writeln!(progress, "Successfully created PDF in {elapsed}ms");
    }
    Ok(elapsed)
}

/// [`convert`], folded into a [`ConversionResult`].
pub fn execute(
    request: ConversionRequest,
    output: &Path,
    renderer: &dyn Renderer,
    progress: &mut dyn Write,
) -> ConversionResult {
    match convert(request, output, renderer, progress) {
        Ok(elapsed) => ConversionResult::succeeded(elapsed),
        Err(e) => {
            log::debug!("Conversion failed ({}): {e}", e.category());
            ConversionResult::failed(&e)
        }
    }
}
