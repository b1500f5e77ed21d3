//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can cross the pipeline boundary.
///
/// Internal strategy and sub-step failures (measurement, extent calculation,
/// pixel-copy timeouts, special-child retrieval) are contained and degrade to
/// a fallback; only the variants below are ever reported to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested node (or the window root) could not be resolved
    #[error("Unable to resolve capture target: {0}")]
    TargetNotFound(String),

    /// The target has non-positive dimensions
    #[error("Impossible to snapshot the view: {0}")]
    InvalidGeometry(String),

    /// Compression, resample, or sink write failed after a buffer was produced
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// A bounded wait on a platform callback elapsed
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Sink I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encode(err.to_string())
    }
}
