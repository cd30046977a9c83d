//! Error types for a single conversion attempt.
//!
//! Every variant is terminal: the conversion is reported as failed and the
//! process exits with status 1. Nothing is retried.

use std::path::PathBuf;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or executing a conversion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad flag value, detected before any I/O.
    #[error("{0}")]
    Validation(String),

    /// The input document could not be read or normalized.
    #[error("Failed to parse '{}': {reason}", path.display())]
    Parse {
        /// Input document path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// The base URI could not be computed.
    #[error("Invalid base URI: {0}")]
    Config(String),

    /// The output sink could not be opened or written.
    #[error("Failed to write '{}': {source}", path.display())]
    Io {
        /// Output path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The renderer failed.
    #[error("Rendering failed: {0}")]
    Render(String),
}

impl Error {
    /// Short name of the error category, used in diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Parse { .. } => "parse",
            Error::Config(_) => "config",
            Error::Io { .. } => "io",
            Error::Render(_) => "render",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_verbatim() {
        let err = Error::Validation("Invalid font specification: Arial,400".to_string());
        assert_eq!(err.to_string(), "Invalid font specification: Arial,400");
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn io_error_names_path() {
        let err = Error::Io {
            path: PathBuf::from("/no/such/dir/page.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/no/such/dir/page.pdf"));
        assert!(msg.contains("not found"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
