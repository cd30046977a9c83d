//! # htmlpdf – HTML/XHTML → PDF command-line front end
//!
//! One invocation converts one document. The stages are:
//!
//! 1. **Options** – flags from [`cli`] collapse into [`options::ConversionOptions`]
//! 2. **Request** – font specs ([`fonts`]), resource policy ([`resources`]) and
//!    the normalized document ([`normalize`]) are assembled by [`request`]
//! 3. **Execute** – [`pipeline`] opens the output and drives a [`render::Renderer`]
//! 4. **Render** – [`layout`] flows the [`dom`] onto pages and [`render`]
//!    emits PDF bytes via printpdf; [`conformance`] finishes accessible
//!    output as PDF/UA + PDF/A-3u
//!
//! [`app::run`] wires the stages together for the binary.

pub mod app;
pub mod cli;
pub mod conformance;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod request;
pub mod resources;
pub mod svg;

// Re-exports for convenience
pub use error::{Error, Result};
pub use options::{ConversionOptions, Verbosity};
pub use pipeline::{execute, ConversionResult};
pub use render::{PdfRenderer, Renderer};
pub use request::{build_request, ConversionRequest};
