//! Generation settings.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::llm::errors::{LlmError, LlmResult};

/// Completion model settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama completion model name.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Temperature for chat replies.
    pub temperature: f64,
    /// Temperature for conversation summaries.
    pub summary_temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Upper bound on one generation call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            base_url: None,
            temperature: 0.7,
            summary_temperature: 0.1,
            max_tokens: None,
            timeout_seconds: 30,
        }
    }
}

impl LlmConfig {
    /// Check ranges and the base URL.
    ///
    /// # Errors
    /// Returns `LlmError::InvalidConfig` on an empty model name, a
    /// temperature outside `[0, 2]` or a zero timeout, and `LlmError::Url`
    /// on a malformed base URL.
    pub fn validate(&self) -> LlmResult<()> {
        if self.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig("model must not be empty".to_string()));
        }
        for (name, value) in [
            ("temperature", self.temperature),
            ("summary_temperature", self.summary_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(LlmError::InvalidConfig(format!(
                    "{name} must be within [0, 2], got {value}"
                )));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(LlmError::InvalidConfig("timeout_seconds must be > 0".to_string()));
        }
        if let Some(base_url) = &self.base_url {
            Url::parse(base_url)?;
        }
        Ok(())
    }
}
