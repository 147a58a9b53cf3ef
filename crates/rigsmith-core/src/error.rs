//! Error types for rigsmith

use thiserror::Error;

/// The main error type for rigsmith operations
#[derive(Debug, Error)]
pub enum RigError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Analysis parse failed: {0}")]
    AnalysisParseFailed(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Batch partially failed: {failed} of {total} layers failed")]
    PartialBatchFailure { failed: usize, total: usize },

    #[error("Cannot {action} while pipeline is {step}")]
    InvalidTransition { action: String, step: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for rigsmith operations
pub type Result<T> = std::result::Result<T, RigError>;

impl From<toml::de::Error> for RigError {
    fn from(err: toml::de::Error) -> Self {
        RigError::TomlParseError(err.to_string())
    }
}

impl From<image::ImageError> for RigError {
    fn from(err: image::ImageError) -> Self {
        RigError::ImageError(err.to_string())
    }
}
