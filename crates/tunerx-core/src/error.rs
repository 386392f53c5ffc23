//! Error types for tunerx.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the serving side of tunerx.
#[derive(Error, Debug)]
pub enum Error {
    /// A request failed schema validation.
    #[error("{message}")]
    InvalidRequest {
        /// Description of the validation failure.
        message: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A model or adapter directory could not be used.
    #[error("Failed to load model from {}: {message}", path.display())]
    ModelLoad {
        /// Offending path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The inference runtime is not ready to serve requests.
    #[error("Model not ready: {model_id}")]
    NotReady {
        /// Served model identifier.
        model_id: String,
    },

    /// The inference runtime returned an error or an unusable response.
    #[error("Runtime error ({status}): {message}")]
    Runtime {
        /// HTTP status reported by the runtime (0 when unreachable).
        status: u16,
        /// Error message.
        message: String,
    },

    /// Operation timed out.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// Duration before timeout.
        duration: Duration,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Returns `true` if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NotReady { .. } => true,
            Self::Runtime { status, .. } => *status == 0 || *status >= 500,
            _ => false,
        }
    }

    /// Creates a validation error with the given message.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    #[must_use]
    pub fn runtime(status: u16, message: impl Into<String>) -> Self {
        Self::Runtime {
            status,
            message: message.into(),
        }
    }

    /// Creates a model load error.
    #[must_use]
    pub fn model_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::runtime(0, "connection refused").is_retryable());
        assert!(Error::runtime(503, "busy").is_retryable());
        assert!(!Error::runtime(400, "bad prompt").is_retryable());
        assert!(!Error::invalid_request("empty").is_retryable());
        assert!(Error::Timeout {
            duration: Duration::from_secs(1)
        }
        .is_retryable());
    }

    #[test]
    fn test_model_load_display() {
        let err = Error::model_load("/data/ckpt", "missing");
        assert_eq!(err.to_string(), "Failed to load model from /data/ckpt: missing");
    }
}
