use crate::embedding::EmbeddingError;
use crate::index::VectorIndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hybrid-rerank
#[derive(Error, Debug)]
pub enum RerankError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Index build failed; any previously installed generation keeps serving
    #[error("Index build failed: {0}")]
    Build(String),

    /// Query issued before an index generation was installed
    #[error("Engine is not ready: no index generation loaded")]
    EngineNotReady,

    /// Query or corpus text could not be embedded
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index construction or search failed
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// Persisted artifacts do not belong to the same index generation
    #[error("Inconsistent index generation in {artifact}: {reason}")]
    InconsistentIndexGeneration { artifact: String, reason: String },

    /// No persisted index at the expected location
    #[error("Index not found: {path}")]
    IndexNotFound { path: PathBuf },

    /// Rejected query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Query server errors
    #[error("Server error: {0}")]
    Server(String),
}

impl RerankError {
    pub(crate) fn inconsistent(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InconsistentIndexGeneration {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for hybrid-rerank operations
pub type Result<T> = std::result::Result<T, RerankError>;
