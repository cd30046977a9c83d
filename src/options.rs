//! Conversion options – the plain configuration value handed from the
//! command line to the request builder.

use std::path::PathBuf;

use log::LevelFilter;

/// Everything a single `convert` invocation was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Input document path.
    pub input: PathBuf,
    /// Output PDF path.
    pub output: PathBuf,
    /// Optional base path used instead of the input location.
    pub base: Option<String>,
    /// Input is already well-formed XHTML; skip normalization.
    pub xhtml: bool,
    /// Deny all external resources.
    pub block: bool,
    /// Force PDF/UA + PDF/A-3u conformance.
    pub accessible: bool,
    pub verbose: bool,
    pub quiet: bool,
    /// Raw `name,weight,file` font specifications, in flag order.
    pub fonts: Vec<String>,
}

impl ConversionOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Effective verbosity; `verbose` takes precedence over `quiet`.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

/// Three-level logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No progress output, renderer diagnostics off.
    Quiet,
    /// Progress output, renderer warnings only.
    #[default]
    Normal,
    /// Progress output and full renderer diagnostics.
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Whether human-readable progress lines are printed.
    pub fn shows_progress(self) -> bool {
        self != Verbosity::Quiet
    }

    /// Log filter for the renderer's internal diagnostics.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Off,
            Verbosity::Normal => LevelFilter::Warn,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn quiet_suppresses_progress_only_without_verbose() {
        let mut opts = ConversionOptions::new("a.html", "a.pdf");
        opts.quiet = true;
        assert!(!opts.verbosity().shows_progress());
        opts.verbose = true;
        assert!(opts.verbosity().shows_progress());
        // Resolving repeatedly yields the same level.
        assert_eq!(opts.verbosity(), opts.verbosity());
    }

    #[test]
    fn level_filters() {
        assert_eq!(Verbosity::Quiet.level_filter(), LevelFilter::Off);
        assert_eq!(Verbosity::Normal.level_filter(), LevelFilter::Warn);
        assert_eq!(Verbosity::Verbose.level_filter(), LevelFilter::Debug);
    }
}
