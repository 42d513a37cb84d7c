//! Error types for mdpress.
//!
//! Library crates use [`MdpressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all mdpress operations.
#[derive(Debug, thiserror::Error)]
pub enum MdpressError {
    /// The source directory could not be listed. Fatal for a pipeline.
    #[error("cannot read directory {path:?}: {source}")]
    DirectoryRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single source file could not be read or decoded as text.
    #[error("cannot read {path:?}: {message}")]
    Read { path: PathBuf, message: String },

    /// The Markdown→HTML renderer failed for one document.
    #[error("render error in {path:?}: {message}")]
    Render { path: PathBuf, message: String },

    /// The PDF engine reported failure for one document.
    #[error("conversion error in {path:?}: {message}")]
    Conversion { path: PathBuf, message: String },

    /// An output file or directory could not be written.
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error outside the conversion pipeline.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MdpressError>;

impl MdpressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn directory_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryRead {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn render(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Render {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn conversion(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
