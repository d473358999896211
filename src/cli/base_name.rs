//! Working out which document to build.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Names preferred when a directory holds several `.tex` files.
const PREFERRED: &[&str] = &["main", "paper"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BaseNameError {
    #[error("Can't guess your filename; pass BASE_NAME.")]
    CannotGuess,
    #[error("BASE_NAME ({0:?}) shouldn't contain '.'")]
    ContainsDot(String),
    #[error("cd into the directory first")]
    ContainsSeparator(String),
}

/// Settle on the document base name, guessing from `dir` when none was given.
pub fn resolve_base_name(given: Option<&str>, dir: &Path) -> Result<String, BaseNameError> {
    let name = match given {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => guess_base_name(dir).ok_or(BaseNameError::CannotGuess)?,
    };
    validate_base_name(&name)
}

/// Strip a `.tex` extension and reject anything that is not a bare file stem.
pub fn validate_base_name(name: &str) -> Result<String, BaseNameError> {
    let name = name.strip_suffix(".tex").unwrap_or(name);
    if name.contains('.') {
        return Err(BaseNameError::ContainsDot(name.to_string()));
    }
    if name.chars().any(std::path::is_separator) || name.contains('/') {
        return Err(BaseNameError::ContainsSeparator(name.to_string()));
    }
    Ok(name.to_string())
}

/// The stem of the only `.tex` file in `dir`, or of the only one named `main` or
/// `paper` when there are several.
pub fn guess_base_name(dir: &Path) -> Option<String> {
    let entries = fs::read_dir(dir).ok()?;
    let mut candidates: BTreeSet<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .filter_map(|name| name.strip_suffix(".tex").map(str::to_string))
        .collect();

    if candidates.len() > 1 {
        candidates.retain(|c| PREFERRED.contains(&c.as_str()));
    }

    tracing::debug!(?candidates, "base name candidates");
    if candidates.len() == 1 {
        candidates.pop_first()
    } else {
        None
    }
}
