//! Error types for the conversation layer.

use thiserror::Error;

use crate::llm::errors::LlmError;
use crate::memory::core::errors::MemoryError;
use crate::memory::core::ids::UserIdError;
use crate::tools::registry::ToolError;

/// Conversation layer error type.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid agent configuration.
    #[error("invalid agent configuration: {0}")]
    InvalidConfig(String),
    /// Rejected user identifier.
    #[error("invalid user: {0}")]
    InvalidUser(#[from] UserIdError),
    /// The summarizer output could not be used.
    #[error("invalid conversation summary: {0}")]
    InvalidSummary(String),
    /// Memory or profile storage failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// Text generation failure.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Tool failure.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Config file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Convenience result alias for conversation operations.
pub type AgentResult<T> = Result<T, AgentError>;
