//! Shared helpers

pub mod paths;

pub use paths::{base_file_name, normalize_path, resolve_symlinks};
