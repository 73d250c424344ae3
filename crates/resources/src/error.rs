//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Decoded or generated data violates the expected format.
    #[error("Invalid {kind}: {message}")]
    InvalidFormat {
        kind: &'static str,
        message: String,
    },
}

impl ResourceError {
    pub(crate) fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
