//! Error types for the collection pipeline.
//!
//! Library modules return [`CollectError`]; the CLI wraps it with `anyhow` context.

use std::path::PathBuf;

/// Everything that can abort a collection run.
///
/// A failing LaTeX build is deliberately not represented here: it is reported as
/// [`crate::collect::CollectOutcome::BuildFailed`] so the caller can propagate the
/// build tool's exit code.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// latexmk output ended before the expected marker showed up.
    #[error("unexpected end of latexmk output while waiting for {waiting_for}")]
    UnexpectedEof { waiting_for: String },

    /// The line after the start marker was not the `<base>.pdf :\` rule header.
    #[error("malformed dependency header: expected {expected:?}, found {found:?}")]
    MalformedHeader { expected: String, found: String },

    /// An `.eps` dependency without its `-eps-converted-to.pdf` companion.
    #[error(
        "{} has no converted PDF at {}; is the build complete?",
        .eps.display(),
        .companion.display()
    )]
    MissingCompanion { eps: PathBuf, companion: PathBuf },

    /// Following symlinks from `path` never reached a regular file.
    #[error("too many levels of symbolic links resolving {}", .path.display())]
    SymlinkLoop { path: PathBuf },

    /// The build tool could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Filesystem or pipe I/O failure.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, CollectError>;

impl CollectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn eof(waiting_for: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            waiting_for: waiting_for.into(),
        }
    }
}
