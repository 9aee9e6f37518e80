//! Command line front end for the `indigo` interpreter.
//!
//! Reads `main.ind` (or a given path) from the current working directory,
//! elaborates and validates it, and either prints the accumulated output of
//! its `$` print directives or renders the diagnostic that aborted the run.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use structopt::StructOpt;

use indigo::driver::{self, Outcome};

/// Command line interface for the Indigo interpreter.
#[derive(StructOpt)]
#[structopt(name = "indigo")]
struct Options {
    /// The entry-point source file, or a directory containing `main.ind`.
    #[structopt(parse(from_os_str), default_value = "main.ind")]
    path: PathBuf,

    /// Coloring of diagnostics written to stderr.
    #[structopt(long = "color", default_value = "auto", possible_values = &["auto", "always", "never"])]
    color: String,
}

fn color_choice(value: &str) -> ColorChoice {
    match value {
        "always" => ColorChoice::Always,
        "never" => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// The detected terminal width, or [`driver::DEFAULT_WIDTH`] when stdout
/// isn't a terminal `term_size` can measure (a pipe, a redirected file).
fn terminal_width() -> usize {
    term_size::dimensions_stdout().map(|(width, _)| width).unwrap_or(driver::DEFAULT_WIDTH)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let options = Options::from_args();
    let width = terminal_width();
    log::debug!("running {} at width {}", options.path.display(), width);

    let base_dir = std::env::current_dir().context("could not read the current directory")?;

    match driver::run_file_with_width(&base_dir, &options.path, width) {
        Outcome::Success { output, .. } => {
            print!("{}", output);
            Ok(())
        }
        Outcome::Failure { files, message } => {
            let diagnostic = message.to_diagnostic();
            let writer = StandardStream::stderr(color_choice(&options.color));
            let config = codespan_reporting::term::Config::default();
            if let Err(error) = codespan_reporting::term::emit(&mut writer.lock(), &config, &files, &diagnostic) {
                eprintln!("error: failed to render diagnostic: {}", error);
            }
            process::exit(1);
        }
    }
}
