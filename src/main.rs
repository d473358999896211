//! arxiv-collector: package a LaTeX paper and the files it uses for arXiv

use anyhow::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    arxiv_collector::cli::run()
}
