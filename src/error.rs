//! meetbear error types

use thiserror::Error;

/// meetbear error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filename did not match any known export pattern
    #[error("Pattern mismatch: {0}")]
    Pattern(String),

    /// PDF text extraction error
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Note publication error
    #[error("Publication error: {0}")]
    Publication(String),

    /// State persistence error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for meetbear operations
pub type Result<T> = std::result::Result<T, Error>;
