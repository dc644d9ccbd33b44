//! Error types for Sibyl

use thiserror::Error;

/// Result type alias for Sibyl operations
pub type Result<T> = std::result::Result<T, SibylError>;

/// Main error type for Sibyl
#[derive(Error, Debug)]
pub enum SibylError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(feature = "remote-embed")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(not(feature = "remote-embed"))]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SibylError {
    /// Check if error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SibylError::Embedding(_) | SibylError::Search(_) | SibylError::Http(_)
        )
    }

    /// Errors that should degrade to the lexical-fallback path instead of
    /// aborting a scan
    pub fn is_retrieval_unavailable(&self) -> bool {
        matches!(self, SibylError::Embedding(_) | SibylError::Http(_))
    }
}
