//! Error types for ContentCrew.
//!
//! Library crates use [`ContentCrewError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ContentCrew operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentCrewError {
    /// Missing or invalid configuration (credentials, config file).
    #[error("config error: {message}")]
    Config { message: String },

    /// Non-success response from an upstream HTTP API. Carries the raw body.
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A generative backend call failed or returned unusable content.
    #[error("generation error: {0}")]
    Generation(String),

    /// An expected artifact file is missing.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Upstream payload could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (user id, relative path, empty selection, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Another run currently holds the workspace lock for this user.
    #[error("workspace for user '{user_id}' is busy (lock file: {})", lock_path.display())]
    WorkspaceBusy { user_id: String, lock_path: PathBuf },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentCrewError>;

impl ContentCrewError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for the given path.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Re-label a failure that happened while talking to a generative backend.
    ///
    /// Configuration errors pass through untouched so a missing API key is
    /// still reported as such.
    pub fn into_generation(self, context: &str) -> Self {
        match self {
            Self::Generation(msg) => Self::Generation(format!("{context}: {msg}")),
            Self::Config { .. } => self,
            other => Self::Generation(format!("{context}: {other}")),
        }
    }
}
