//! Error types for pdfstruct library.

use std::io;
use thiserror::Error;

/// Result type alias for pdfstruct operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during structure reconstruction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input or backend JSON could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value was rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// The backend reported a failure.
    #[error("Backend '{backend}' failed: {message}")]
    Backend {
        /// Backend name (e.g. "docling")
        backend: String,
        /// Failure description
        message: String,
    },

    /// The backend did not answer within the configured timeout.
    #[error("Backend request timed out after {0} ms")]
    BackendTimeout(u64),

    /// The backend health check failed.
    #[error("Backend '{0}' is not available")]
    BackendUnavailable(String),

    /// The backend answered with a document we could not interpret.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Backend processing failed and the local fallback was disabled.
    #[error("Backend processing failed and fallback is disabled: {0}")]
    BackendFailed(Box<Error>),

    /// HTTP transport error.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error came from the backend path (and is therefore
    /// subject to the fallback policy).
    pub fn is_backend_error(&self) -> bool {
        match self {
            Error::Backend { .. }
            | Error::BackendTimeout(_)
            | Error::BackendUnavailable(_)
            | Error::InvalidResponse(_) => true,
            #[cfg(feature = "http")]
            Error::Http(_) => true,
            _ => false,
        }
    }
}
