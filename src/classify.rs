//! Per-dependency inclusion decisions
//!
//! [`classify`] is a pure function from one dependency path to the [`Action`] the
//! archiver should take. It never touches the filesystem; existence checks and
//! symlink resolution happen when the action is carried out.

use std::path::Path;

/// Packages whose system-installed files are shipped by default.
pub const DEFAULT_PACKAGES: &[&str] = &["biblatex"];

/// Suffix epstopdf gives the PDF it generates next to an `.eps` figure.
pub const EPS_CONVERTED_SUFFIX: &str = "-eps-converted-to.pdf";

/// Package name fragments whose files under absolute (system) paths are archived.
///
/// A path matches if it contains `/<pkg>/` for any configured package; order is
/// irrelevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFilter {
    packages: Vec<String>,
}

impl PackageFilter {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self { packages: Vec::new() };
        for pkg in packages {
            let pkg = pkg.into();
            let pkg = pkg.trim_matches('/').to_string();
            if !pkg.is_empty() && !filter.packages.contains(&pkg) {
                filter.packages.push(pkg);
            }
        }
        filter
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn matches(&self, path: &str) -> bool {
        self.packages.iter().any(|pkg| {
            path.match_indices(pkg.as_str()).any(|(idx, _)| {
                path[..idx].ends_with('/') && path[idx + pkg.len()..].starts_with('/')
            })
        })
    }
}

impl Default for PackageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGES.iter().copied())
    }
}

/// Why a dependency was left out of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A system file outside the configured packages.
    SystemFile,
    /// An epstopdf output; the `.eps` line already accounts for it.
    ConvertedCompanion,
    /// Bibliography source; the compiled `.bbl` ships instead.
    BibSource,
    Blank,
}

/// What to do with one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Package file from a system directory, stored under its bare file name.
    Flatten { source: String, name: String },
    /// `.tex` source to be comment-stripped at its relative path.
    StripTex { path: String },
    /// File stored byte-for-byte at its relative path.
    Verbatim { path: String },
    /// `.eps` figure replaced by its converted PDF, stored as `<stem>.pdf`.
    ConvertedEps {
        eps: String,
        companion: String,
        name: String,
    },
    Skip(SkipReason),
}

/// Turn a raw trace line into a dependency path: trim it and drop the make-style
/// continuation backslash.
pub fn parse_dependency(raw: &str) -> &str {
    let dep = raw.trim();
    dep.strip_suffix('\\').unwrap_or(dep)
}

/// Decide what to do with a dependency path. Rules are checked in order; the first
/// one that applies wins.
pub fn classify(dep: &str, packages: &PackageFilter, strip_comments: bool) -> Action {
    if dep.is_empty() {
        return Action::Skip(SkipReason::Blank);
    }

    if is_absolute(dep) {
        return if packages.matches(dep) {
            Action::Flatten {
                source: dep.to_string(),
                name: crate::utils::base_file_name(dep).to_string(),
            }
        } else {
            Action::Skip(SkipReason::SystemFile)
        };
    }

    if dep.ends_with(".tex") {
        return if strip_comments {
            Action::StripTex {
                path: dep.to_string(),
            }
        } else {
            Action::Verbatim {
                path: dep.to_string(),
            }
        };
    }

    if let Some(stem) = dep.strip_suffix(".eps") {
        return Action::ConvertedEps {
            eps: dep.to_string(),
            companion: format!("{stem}{EPS_CONVERTED_SUFFIX}"),
            name: format!("{stem}.pdf"),
        };
    }

    if dep.ends_with(EPS_CONVERTED_SUFFIX) {
        return Action::Skip(SkipReason::ConvertedCompanion);
    }

    if dep.ends_with(".bib") {
        return Action::Skip(SkipReason::BibSource);
    }

    Action::Verbatim {
        path: dep.to_string(),
    }
}

fn is_absolute(dep: &str) -> bool {
    dep.starts_with('/') || Path::new(dep).is_absolute()
}
