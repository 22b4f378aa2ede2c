//! Result and error types for Pixelgate.

use thiserror::Error;

/// Result type for Pixelgate operations
pub type PixelgateResult<T> = Result<T, PixelgateError>;

/// Errors that can occur in Pixelgate
#[derive(Debug, Error)]
pub enum PixelgateError {
    /// Image input is unusable (zero-sized, undecodable)
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// Caller passed an argument outside its domain
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Configuration failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Screen capture collaborator failed
    #[error("Capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// Requested baseline does not exist
    #[error("Baseline not found: {key}")]
    BaselineNotFound {
        /// Baseline key
        key: String,
    },

    /// Requested run artifact (actual capture, diff) does not exist
    #[error("Artifact not found: {path}")]
    ArtifactNotFound {
        /// Artifact path
        path: String,
    },

    /// Similarity model could not be loaded or evaluated
    #[error("Similarity model unavailable: {message}")]
    ModelUnavailable {
        /// Error message
        message: String,
    },

    /// Image processing error (resizing, encoding, etc.)
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl PixelgateError {
    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }
}
