//! Command-line interface for arxiv-collector
//!
//! Parses arguments, merges them with the environment and any config file, then
//! hands the run to [`crate::collect::write_archive`].

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::build::Latexmk;
use crate::classify::{PackageFilter, DEFAULT_PACKAGES};
use crate::collect::{write_archive, CollectOutcome};
use crate::config::{load_config, CollectOptions, FileConfig, DEFAULT_DEST};

mod base_name;

pub use base_name::{guess_base_name, resolve_base_name, validate_base_name, BaseNameError};

/// Collect a LaTeX paper and the files it actually uses into an arXiv-ready tarball
#[derive(Parser, Debug)]
#[command(name = "arxiv-collector")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Main document name without `.tex`; guessed from the current directory if omitted
    #[arg(value_name = "BASE_NAME")]
    pub base_name: Option<String>,

    /// Also ship style files from this system package (repeatable)
    #[arg(short = 'p', long = "include-package", value_name = "PKG")]
    pub include_packages: Vec<String>,

    /// Don't ship biblatex's style files
    #[arg(long, conflicts_with = "no_skip_biblatex")]
    pub skip_biblatex: bool,

    /// Ship biblatex's style files even if the config file skips them
    #[arg(long)]
    pub no_skip_biblatex: bool,

    /// Where to write the archive [default: arxiv.tar.gz]
    #[arg(long, value_name = "PATH", env = "ARXIV_COLLECTOR_DEST")]
    pub dest: Option<PathBuf>,

    /// Strip comments from all .tex files (the default)
    #[arg(long, conflicts_with = "no_strip_comments")]
    pub strip_comments: bool,

    /// Keep .tex files exactly as they are
    #[arg(long)]
    pub no_strip_comments: bool,

    /// latexmk executable to run
    #[arg(long, value_name = "PROG", env = "ARXIV_COLLECTOR_LATEXMK")]
    pub latexmk: Option<String>,

    /// Read settings from this file instead of looking for arxiv-collector.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let cwd = Path::new(".");
    let base_name = match resolve_base_name(cli.base_name.as_deref(), cwd) {
        Ok(name) => name,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let file_config = load_config(cwd, cli.config.as_deref())?;
    let options = build_options(&cli, base_name, file_config);
    tracing::debug!(?options, "resolved options");

    println!("Building {}...", options.base_name);
    let outcome = write_archive(&options, cwd)
        .with_context(|| format!("Failed to collect {}", options.base_name))?;

    match outcome {
        CollectOutcome::Success { entries } => {
            tracing::info!(entries = entries.len(), "archive written");
            println!("Output in {}", options.dest.display());
            Ok(ExitCode::SUCCESS)
        }
        CollectOutcome::BuildFailed { code } => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
    }
}

/// Merge CLI arguments (already carrying env values) over the config file and the
/// defaults.
pub fn build_options(cli: &Cli, base_name: String, file: FileConfig) -> CollectOptions {
    let skip_biblatex = if cli.skip_biblatex {
        true
    } else if cli.no_skip_biblatex {
        false
    } else {
        file.skip_biblatex.unwrap_or(false)
    };
    let defaults = DEFAULT_PACKAGES
        .iter()
        .filter(|pkg| !(skip_biblatex && **pkg == "biblatex"))
        .map(|pkg| pkg.to_string());
    let packages = PackageFilter::new(
        defaults
            .chain(file.include_packages)
            .chain(cli.include_packages.iter().cloned()),
    );

    let strip_comments = if cli.strip_comments {
        true
    } else if cli.no_strip_comments {
        false
    } else {
        file.strip_comments.unwrap_or(true)
    };

    let dest = cli
        .dest
        .clone()
        .or(file.dest)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST));

    let latexmk = cli
        .latexmk
        .clone()
        .or(file.latexmk)
        .map(Latexmk::new)
        .unwrap_or_default();

    CollectOptions {
        base_name,
        packages,
        strip_comments,
        dest,
        latexmk,
    }
}
