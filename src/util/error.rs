//! Error types for the shadow renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for renderer and shadow-model operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No GPU adapter matched the request
    #[error("No suitable GPU adapter: {0}")]
    NoAdapter(String),

    /// Adapter refused to create a device
    #[error("Failed to create GPU device: {0}")]
    RequestDevice(String),

    /// Shader module or pipeline failed validation
    #[error("Shader stage '{stage}' failed: {log}")]
    ShaderStage { stage: String, log: String },

    /// GPU resource (texture, buffer, target) could not be created
    #[error("Failed to create {resource}: {message}")]
    ResourceCreation { resource: String, message: String },

    /// Mapping a readback buffer failed
    #[error("GPU readback failed: {0}")]
    Readback(String),

    /// Texel data does not match the declared map size
    #[error("Size mismatch: expected {expected} texels, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Shadow mode index or name not recognised
    #[error("Unknown shadow mode '{0}' (expected 0-3 or basic/pcf/pcss/vssm)")]
    InvalidShadowMode(String),

    /// Settings failed validation
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// Settings file could not be parsed
    #[error("Failed to parse settings {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encode/decode error
    #[cfg(feature = "gpu")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Create a shader stage error.
    pub fn shader(stage: impl Into<String>, log: impl Into<String>) -> Self {
        Self::ShaderStage {
            stage: stage.into(),
            log: log.into(),
        }
    }

    /// Create a resource creation error.
    pub fn resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceCreation {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::shader("sat_rows", "binding mismatch");
        assert!(e.to_string().contains("sat_rows"));
        assert!(e.to_string().contains("binding mismatch"));

        let e = Error::SizeMismatch { expected: 16, actual: 3 };
        assert!(e.to_string().contains("16"));
        assert!(e.to_string().contains("3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_invalid_mode_message() {
        let e = Error::InvalidShadowMode("7".into());
        assert!(e.to_string().contains("'7'"));
    }
}
