//! Command-line surface: `htmlpdf convert ...` plus the built-in `help`
//! subcommand and `--version`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::options::ConversionOptions;

#[derive(Debug, Parser)]
#[command(name = "htmlpdf", version, about = "HTML/XHTML to PDF converter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Converts a single html file into a PDF
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// The html input file
    #[arg(short = 'i', long = "input", value_name = "input")]
    pub input: PathBuf,

    /// Load truetype font
    #[arg(short = 'f', long = "font", value_name = "name,weight,file")]
    pub fonts: Vec<String>,

    /// The base path (base uri) for resources
    #[arg(long = "base", value_name = "path")]
    pub base: Option<String>,

    /// The PDF output file
    #[arg(short = 'o', long = "output", value_name = "output")]
    pub output: PathBuf,

    /// Input file is valid XHTML (skips the HTML to XHTML step)
    #[arg(short = 'x', long = "xhtml")]
    pub xhtml: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (ignored with --verbose)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Block linked resources (CSS, images, fonts)
    #[arg(short = 'b', long = "block")]
    pub block: bool,

    /// Force PDF/UA and PDF/A-3u conformance
    #[arg(short = 'a', long = "accessible")]
    pub accessible: bool,
}

impl From<ConvertArgs> for ConversionOptions {
    fn from(args: ConvertArgs) -> Self {
        ConversionOptions {
            input: args.input,
            output: args.output,
            base: args.base,
            xhtml: args.xhtml,
            block: args.block,
            accessible: args.accessible,
            verbose: args.verbose,
            quiet: args.quiet,
            fonts: args.fonts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ConversionOptions {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Convert(a) => a.into(),
        }
    }

    #[test]
    fn parses_short_flags() {
        let opts = parse(&[
            "htmlpdf", "convert", "-i", "page.xhtml", "-o", "out.pdf", "-x", "-a", "-b", "-q",
        ]);
        assert_eq!(opts.input, PathBuf::from("page.xhtml"));
        assert_eq!(opts.output, PathBuf::from("out.pdf"));
        assert!(opts.xhtml && opts.accessible && opts.block && opts.quiet);
        assert!(!opts.verbose);
        assert!(opts.base.is_none());
    }

    #[test]
    fn font_flag_is_repeatable() {
        let opts = parse(&[
            "htmlpdf",
            "convert",
            "--input",
            "a.html",
            "--output",
            "a.pdf",
            "-f",
            "Sans,400,sans.ttf",
            "--font",
            "Sans,700,sans-bold.ttf",
            "--base",
            "assets",
        ]);
        assert_eq!(opts.fonts, vec!["Sans,400,sans.ttf", "Sans,700,sans-bold.ttf"]);
        assert_eq!(opts.base.as_deref(), Some("assets"));
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(Cli::try_parse_from(["htmlpdf", "convert", "-i", "a.html"]).is_err());
        assert!(Cli::try_parse_from(["htmlpdf", "convert", "-o", "a.pdf"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
