//! Conversion request – the single, fully assembled configuration handed
//! to the renderer.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use crate::fonts::{parse_font_specs, FontRegistration};
use crate::normalize::{prepare_source, DocumentSource, Normalizer};
use crate::options::{ConversionOptions, Verbosity};
use crate::resources::{ResourceAccess, ResourcePolicy};
use crate::svg::{PrintpdfSvgDrawer, SvgDrawer};

/// Output conformance constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConformanceMode {
    /// Renderer default.
    #[default]
    None,
    /// PDF/UA accessibility plus PDF/A-3u archival conformance.
    PdfUaPdfA3u,
}

impl ConformanceMode {
    pub fn from_accessible_flag(accessible: bool) -> Self {
        if accessible {
            ConformanceMode::PdfUaPdfA3u
        } else {
            ConformanceMode::None
        }
    }
}

/// Everything the renderer needs for one conversion. Built once, consumed
/// once.
pub struct ConversionRequest {
    pub source: DocumentSource,
    /// Input path as given, for diagnostics and the title fallback.
    pub input: PathBuf,
    pub fonts: Vec<FontRegistration>,
    pub policy: ResourcePolicy,
    pub resources: ResourceAccess,
    pub conformance: ConformanceMode,
    pub fast_mode: bool,
    pub svg_drawer: Box<dyn SvgDrawer>,
    pub verbosity: Verbosity,
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("source", &self.source)
            .field("input", &self.input)
            .field("fonts", &self.fonts)
            .field("policy", &self.policy)
            .field("conformance", &self.conformance)
            .field("fast_mode", &self.fast_mode)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

/// Assemble a request from the command-line options.
///
/// Font specifications are validated before the input is touched, so a bad
/// `--font` never causes any I/O.
pub fn build_request(
    options: &ConversionOptions,
    normalizer: &dyn Normalizer,
) -> Result<ConversionRequest> {
    let fonts = parse_font_specs(&options.fonts)?;
    let policy = ResourcePolicy::from_block_flag(options.block);
    let source = prepare_source(
        &options.input,
        options.xhtml,
        options.base.as_deref(),
        normalizer,
    )?;

    Ok(ConversionRequest {
        source,
        input: options.input.clone(),
        fonts,
        policy,
        resources: policy.access(),
        conformance: ConformanceMode::from_accessible_flag(options.accessible),
        fast_mode: true,
        svg_drawer: Box::new(PrintpdfSvgDrawer),
        verbosity: options.verbosity(),
    })
}
