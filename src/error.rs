//! Error types for audex.

use thiserror::Error;

/// Library-level error type for audex operations.
///
/// These errors stay inside a stage; the pipeline itself reports failures as
/// [`StageFailure`](crate::stage::StageFailure) values.
#[derive(Error, Debug)]
pub enum AudexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Invalid S3 URI: {0}")]
    InvalidS3Uri(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for audex operations.
pub type Result<T> = std::result::Result<T, AudexError>;
