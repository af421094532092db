//! Error types for text generation.

use std::time::Duration;

use thiserror::Error;

/// Text generation error type.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Invalid generator configuration.
    #[error("invalid llm configuration: {0}")]
    InvalidConfig(String),
    /// The call did not finish in time.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    /// The model answered with nothing usable.
    #[error("model returned an empty response")]
    EmptyResponse,
    /// Completion error reported by the Rig provider.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for generation calls.
pub type LlmResult<T> = Result<T, LlmError>;
