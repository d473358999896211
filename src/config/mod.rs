//! Configuration loading and merging
//!
//! Settings come from CLI arguments, environment variables, and an optional config
//! file, with precedence CLI > Env > File > Defaults. The merged result is a
//! [`CollectOptions`] that stays fixed for the whole run.

pub mod loader;

pub use loader::load_config;

use crate::build::Latexmk;
use crate::classify::PackageFilter;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_DEST: &str = "arxiv.tar.gz";

/// Settings that may be given in `arxiv-collector.toml` / `.yml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Extra packages whose system files are archived, on top of the defaults.
    pub include_packages: Vec<String>,
    pub skip_biblatex: Option<bool>,
    pub strip_comments: Option<bool>,
    pub dest: Option<PathBuf>,
    pub latexmk: Option<String>,
}

/// Everything one collection run needs.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub base_name: String,
    pub packages: PackageFilter,
    pub strip_comments: bool,
    pub dest: PathBuf,
    pub latexmk: Latexmk,
}

impl CollectOptions {
    /// Options with the stock package filter, stripping on, and the default paths.
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            packages: PackageFilter::default(),
            strip_comments: true,
            dest: PathBuf::from(DEFAULT_DEST),
            latexmk: Latexmk::default(),
        }
    }

    /// Path of the compiled bibliography latexmk leaves next to the document.
    pub fn bbl_name(&self) -> String {
        format!("{}.bbl", self.base_name)
    }
}
