//! Harness error types.

use std::path::PathBuf;

use esp_fixtures::{FixtureError, SecretVersion};
use thiserror::Error;

/// Result type for harness operations.
pub type E2eResult<T> = Result<T, E2eError>;

/// Errors raised by the harness around the fixture core.
#[derive(Debug, Error)]
pub enum E2eError {
    /// HTTP/network error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A client certificate or key file is not on disk
    #[error("certificate file missing: {path}")]
    CertificateMissing { path: PathBuf },

    /// Non-2xx response with `raise_on_error` set
    #[error("API returned {status} for {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Performance statistics could not be read
    #[error("performance stats error: {message}")]
    Stats { message: String },

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

impl E2eError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn stats(message: impl Into<String>) -> Self {
        Self::Stats {
            message: message.into(),
        }
    }

    /// HTTP status, if this error came from a response.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Data and object store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialise record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("object key '{key}' is not valid under the store root")]
    InvalidKey { key: String },

    #[error("store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Secret retrieval failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    /// Neither the current nor the previous version exists.
    #[error("no AWSCURRENT or AWSPREVIOUS secret exists for '{name}'")]
    NoVersions { name: String },

    /// A scenario asked for a version that was not fetched.
    #[error("secret version {version} is not available")]
    MissingVersion { version: SecretVersion },

    /// The backing source failed for one stage.
    #[error("error retrieving '{name}' ({stage}): {message}")]
    Fetch {
        name: String,
        stage: String,
        message: String,
    },
}
