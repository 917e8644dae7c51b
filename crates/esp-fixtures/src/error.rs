//! Error types for fixture handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::date_math::DateMathError;

/// Result type for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;

/// A recognized placeholder that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to resolve placeholder <<{token}>>: {source}")]
pub struct PlaceholderError {
    /// Token text without the `<<>>` wrapper.
    pub token: String,
    #[source]
    pub source: DateMathError,
}

/// Errors raised while loading fixture files.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// Directory listing or file read failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Scenario file has no usable `data` section or bad metadata.
    #[error("malformed scenario {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl FixtureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
