//! htmlpdf – command-line HTML/XHTML → PDF converter.
//!
//! Usage:
//!   htmlpdf convert -i <input> -o <output> [-f name,weight,file]... [--base path]
//!                   [-x] [-v|-q] [-b] [-a]

use std::{io, process};

use clap::Parser;

use htmlpdf::app;
use htmlpdf::cli::{Cli, Command};
use htmlpdf::options::ConversionOptions;
use htmlpdf::render::PdfRenderer;

fn main() {
    let cli = Cli::parse();

    let Command::Convert(args) = cli.command;
    let options = ConversionOptions::from(args);
    let level = options.verbosity().level_filter();

    // RUST_LOG still overrides the flag-derived level.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();

    let renderer = PdfRenderer::new(level);
    let result = app::run(&options, &renderer, &mut io::stdout(), &mut io::stderr());
    process::exit(result.exit_code());
}
