//! Error types and handling for avifpress

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for avifpress operations
pub type Result<T> = std::result::Result<T, AvifpressError>;

/// Main error type for avifpress operations
#[derive(Debug, Error)]
pub enum AvifpressError {
    /// I/O related errors (open, write, remove)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decode or encode failures from the image codec
    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// Directory traversal failures (unreadable root or walk error)
    #[error("Traversal error: {0}")]
    Traversal(#[from] walkdir::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Destination already exists and the collision policy forbids overwriting
    #[error("Destination already exists: {path:?}")]
    DestinationExists { path: PathBuf },

    /// Destination path resolves to the source file itself
    #[error("Destination would overwrite the source file: {path:?}")]
    DestinationIsSource { path: PathBuf },

    /// Batch orchestration errors (worker join failures)
    #[error("Batch error: {message}")]
    Batch { message: String },
}

impl AvifpressError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new batch orchestration error
    pub fn batch<S: Into<String>>(message: S) -> Self {
        Self::Batch {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the batch can keep going)
    ///
    /// Per-file failures are swallowed into the batch summary; traversal,
    /// configuration, and orchestration errors abort the whole run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_)
            | Self::Codec(_)
            | Self::DestinationExists { .. }
            | Self::DestinationIsSource { .. } => true,

            Self::Traversal(_) | Self::Config { .. } | Self::Batch { .. } => false,
        }
    }
}
