//! Error types for the scoring job.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`EvalError`].
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised while loading data, querying the model or reporting scores.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A dataset file could not be read or parsed.
    #[error("Failed to load dataset {}: {message}", path.display())]
    Dataset {
        /// Dataset path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The inference response had no string `output` field.
    #[error("Response has no string `output` field")]
    MissingOutput,

    /// Every attempt failed.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last: Box<EvalError>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    /// Returns `true` if another attempt at the same request may succeed.
    ///
    /// The scoring client treats every request failure alike, so this covers
    /// all transport and response errors.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Status { .. } | Self::MissingOutput | Self::Serialization(_)
        )
    }

    /// Creates a dataset error.
    #[must_use]
    pub fn dataset(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Dataset {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
