//! Error types for chemlink.

use thiserror::Error;

/// Result type alias using chemlink's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for chemlink operations.
///
/// A backend that merely could not produce output (a soft miss) never
/// surfaces as an `Error`; it is reported as `Ok(None)` and resolved inside
/// the pipeline that asked for it.
#[derive(Error, Debug)]
pub enum Error {
    /// No backend could parse the input structure
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Requested output format is not known to any backend
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Requested image format is not png, jpg/jpeg or svg
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Render chain exhausted without usable bytes
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// External process could not start, timed out, or exited non-zero
    #[error("Command error: {0}")]
    Command(String),

    /// The embedded toolkit rejected a call
    #[error("Toolkit error: {0}")]
    Toolkit(String),

    /// Raster decode/encode failed
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can fix the request (as opposed to a server-side failure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidStructure(_)
                | Error::UnsupportedFormat(_)
                | Error::UnsupportedImageFormat(_)
                | Error::RenderFailure(_)
                | Error::InvalidInput(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", e))
    }
}
