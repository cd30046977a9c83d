//! External resource policy.
//!
//! Every external reference the renderer follows (images, SVG files) goes
//! through three steps: an access check on the raw reference, URI
//! resolution against the document base, and an access check on the
//! resolved URI. [`ResourcePolicy`] selects the strategy objects for all
//! three once, at configuration time.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use url::Url;

/// What kind of resource a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Svg,
    Css,
    Font,
    XmlDocument,
    Binary,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Image,
        ResourceKind::Svg,
        ResourceKind::Css,
        ResourceKind::Font,
        ResourceKind::XmlDocument,
        ResourceKind::Binary,
    ];
}

/// When an [`AccessController`] runs relative to URI resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPriority {
    BeforeResolvingUri,
    AfterResolvingUri,
}

/// Resolves a reference found in the document against its base URI.
pub trait UriResolver {
    fn resolve(&self, base: Option<&Url>, href: &str) -> Option<Url>;
}

/// Decides whether a resource may be fetched.
pub trait AccessController {
    fn allows(&self, uri: &str, kind: ResourceKind) -> bool;
}

/// RFC 3986 resolution: absolute references are taken as-is, relative ones
/// are joined onto the base.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUriResolver;

impl UriResolver for DefaultUriResolver {
    fn resolve(&self, base: Option<&Url>, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        match Url::parse(href) {
            Ok(abs) => Some(abs),
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok(),
            Err(_) => None,
        }
    }
}

/// Never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl UriResolver for NullResolver {
    fn resolve(&self, _base: Option<&Url>, _href: &str) -> Option<Url> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessController for AllowAll {
    fn allows(&self, _uri: &str, _kind: ResourceKind) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AccessController for DenyAll {
    fn allows(&self, _uri: &str, _kind: ResourceKind) -> bool {
        false
    }
}

/// Resource policy selected by the `--block` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourcePolicy {
    #[default]
    Unrestricted,
    BlockAll,
}

impl ResourcePolicy {
    pub fn from_block_flag(block: bool) -> Self {
        if block {
            ResourcePolicy::BlockAll
        } else {
            ResourcePolicy::Unrestricted
        }
    }

    pub fn uri_resolver(self) -> Box<dyn UriResolver> {
        match self {
            ResourcePolicy::Unrestricted => Box::new(DefaultUriResolver),
            ResourcePolicy::BlockAll => Box::new(NullResolver),
        }
    }

    pub fn access_controller(self, _priority: ControlPriority) -> Box<dyn AccessController> {
        match self {
            ResourcePolicy::Unrestricted => Box::new(AllowAll),
            ResourcePolicy::BlockAll => Box::new(DenyAll),
        }
    }

    /// The complete set of strategy objects for this policy.
    pub fn access(self) -> ResourceAccess {
        ResourceAccess {
            resolver: self.uri_resolver(),
            before_resolving: self.access_controller(ControlPriority::BeforeResolvingUri),
            after_resolving: self.access_controller(ControlPriority::AfterResolvingUri),
        }
    }
}

/// The resolver and both access gates installed for one conversion.
pub struct ResourceAccess {
    pub resolver: Box<dyn UriResolver>,
    pub before_resolving: Box<dyn AccessController>,
    pub after_resolving: Box<dyn AccessController>,
}

impl ResourceAccess {
    pub fn controller(&self, priority: ControlPriority) -> &dyn AccessController {
        match priority {
            ControlPriority::BeforeResolvingUri => self.before_resolving.as_ref(),
            ControlPriority::AfterResolvingUri => self.after_resolving.as_ref(),
        }
    }
}

impl fmt::Debug for ResourceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceAccess").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// A fetched resource.
#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Resource {
    pub fn is_svg(&self) -> bool {
        self.mime.as_deref() == Some("image/svg+xml")
            || self
                .uri
                .split(['?', '#'])
                .next()
                .is_some_and(|p| p.to_ascii_lowercase().ends_with(".svg"))
    }
}

/// Fetches resources referenced by a document, honouring both access gates.
/// `file:` and base64 `data:` URIs are supported; anything else is skipped.
pub struct ResourceLoader<'a> {
    access: &'a ResourceAccess,
    base: Option<&'a Url>,
}

impl<'a> ResourceLoader<'a> {
    pub fn new(access: &'a ResourceAccess, base: Option<&'a Url>) -> Self {
        Self { access, base }
    }

    /// Fetch `href`. Returns `None` when access is denied, the reference does
    /// not resolve, or the resource cannot be read; the reason is logged.
    pub fn fetch(&self, href: &str, kind: ResourceKind) -> Option<Resource> {
        if !self.access.controller(ControlPriority::BeforeResolvingUri).allows(href, kind) {
            log::debug!("Access denied to {kind:?} resource '{href}'");
            return None;
        }
        let Some(url) = self.access.resolver.resolve(self.base, href) else {
            log::debug!("Could not resolve {kind:?} resource '{href}'");
            return None;
        };
        if !self.access.controller(ControlPriority::AfterResolvingUri).allows(url.as_str(), kind) {
            log::debug!("Access denied to {kind:?} resource '{url}'");
            return None;
        }

        match url.scheme() {
            "data" => match parse_data_uri(url.as_str()) {
                Ok((mime, bytes)) => Some(Resource {
                    uri: url.to_string(),
                    mime,
                    bytes,
                }),
                Err(e) => {
                    log::warn!("Skipping resource: {e}");
                    None
                }
            },
            "file" => {
                let path = url.to_file_path().ok()?;
                match std::fs::read(&path) {
                    Ok(bytes) => Some(Resource {
                        uri: url.to_string(),
                        mime: None,
                        bytes,
                    }),
                    Err(e) => {
                        log::warn!("Skipping resource '{}': {e}", path.display());
                        None
                    }
                }
            }
            other => {
                log::warn!("Skipping resource '{url}': unsupported scheme '{other}'");
                None
            }
        }
    }
}

/// Parse a `data:<mime>;base64,<data>` URI into its media type and raw bytes.
fn parse_data_uri(src: &str) -> Result<(Option<String>, Vec<u8>), String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "Not a data URI".to_string())?;
    let comma_pos = rest.find(',').ok_or_else(|| {
        "Invalid data URI: missing `,` separator between header and data".to_string()
    })?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err("Only base64-encoded data URIs are supported".to_string());
    }
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_lowercase);
    let bytes = BASE64_STD
        .decode(rest[comma_pos + 1..].trim())
        .map_err(|e| format!("Base64 decode error: {e}"))?;
    Ok((mime, bytes))
}
