//! arxiv-collector: package a LaTeX paper for arXiv submission
//!
//! Runs `latexmk -deps` to learn which files the document really uses, then writes
//! those files into a `.tar.gz`: `.tex` sources with comments stripped, `.eps`
//! figures swapped for their converted PDFs, selected package style files flattened
//! to the top level, and the compiled `.bbl` in place of the `.bib` sources.

pub mod archive;
pub mod build;
pub mod classify;
pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod strip;
pub mod trace;
pub mod utils;

pub use collect::{collect, write_archive, CollectOutcome};
pub use config::CollectOptions;
pub use error::{CollectError, Result};
