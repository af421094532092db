//! Error types for the memory subsystem.

use thiserror::Error;

/// Memory subsystem error type.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Invalid memory item content or metadata.
    #[error("invalid memory item: {0}")]
    InvalidMemoryItem(String),
    /// Priority label outside `high`, `medium`, `low`.
    #[error("invalid priority: {0:?}")]
    InvalidPriority(String),
    /// Vector index collaborator failure.
    #[error("vector index error: {0}")]
    Index(String),
    /// Embedding collaborator failure.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Embedding error reported by the Rig provider.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
