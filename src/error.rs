use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Passim operations
#[derive(Error, Debug)]
pub enum PassimError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Input rejected before any I/O (bad top_k, empty query, bad dimension)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document id absent where the caller required it to exist
    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

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

    /// Record store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Lexical index errors
    #[error("Keyword index error: {0}")]
    KeywordIndex(String),

    /// Lexical query string could not be parsed
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Embedding vector length does not match the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Passage extraction errors
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A concurrent sub-query task failed to complete
    #[error("Task join error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for Passim operations
pub type Result<T> = std::result::Result<T, PassimError>;
