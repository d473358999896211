//! Path helpers: symlink resolution and archive-name normalization

use crate::error::{CollectError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on link hops, matching the usual kernel `ELOOP` limit.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Follow `path` through symbolic links until it names something that is not a link.
///
/// Relative link targets are resolved against the directory containing the link.
/// Fails with [`CollectError::SymlinkLoop`] on a cycle or after
/// [`MAX_SYMLINK_HOPS`] hops, and with [`CollectError::Io`] if a link in the chain
/// points at nothing.
pub fn resolve_symlinks(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    let mut visited: HashSet<PathBuf> = HashSet::new();

    loop {
        let meta = fs::symlink_metadata(&current).map_err(|e| CollectError::io(&current, e))?;
        if !meta.file_type().is_symlink() {
            return Ok(current);
        }

        if visited.len() >= MAX_SYMLINK_HOPS || !visited.insert(current.clone()) {
            return Err(CollectError::SymlinkLoop {
                path: path.to_path_buf(),
            });
        }

        let target = fs::read_link(&current).map_err(|e| CollectError::io(&current, e))?;
        current = if target.is_absolute() {
            target
        } else {
            match current.parent() {
                Some(parent) => parent.join(target),
                None => target,
            }
        };
    }
}

/// Archive member names always use forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Final component of `path`, used for flattened entries.
pub fn base_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
