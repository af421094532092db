//! Agent configuration: a JSON file plus `PERSONA_*` environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::errors::{AgentError, AgentResult};
use crate::agent::prompt::PromptTemplates;
use crate::emotion::keywords::EmotionKeywords;
use crate::llm::config::LlmConfig;
use crate::memory::core::config::MemoryConfig;
use crate::memory::scoring::lexicon::ScoringLexicon;

/// Path of a JSON config file.
pub const CONFIG_PATH_ENV: &str = "PERSONA_CONFIG";
/// HTTP port.
pub const PORT_ENV: &str = "PERSONA_PORT";
/// Ollama base URL, used for both completion and embeddings.
pub const OLLAMA_URL_ENV: &str = "PERSONA_OLLAMA_URL";
/// Completion model name.
pub const MODEL_ENV: &str = "PERSONA_MODEL";
/// Embedding model name; unset keeps the hashing fallback.
pub const EMBEDDING_MODEL_ENV: &str = "PERSONA_EMBEDDING_MODEL";
/// Embedding dimensionality.
pub const EMBEDDING_DIMS_ENV: &str = "PERSONA_EMBEDDING_DIMS";
/// `SQLite` database path; unset keeps everything in memory.
pub const DB_PATH_ENV: &str = "PERSONA_DB_PATH";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Everything the agent needs to start.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// HTTP port.
    pub port: u16,
    /// `SQLite` file for profiles and vectors; `None` keeps them in memory.
    pub database_path: Option<PathBuf>,
    /// Memory engine settings.
    pub memory: MemoryConfig,
    /// Completion model settings.
    pub llm: LlmConfig,
    /// Emotion keyword sets.
    pub emotion: EmotionKeywords,
    /// Importance scorer word lists.
    pub lexicon: ScoringLexicon,
    /// Prompt wording.
    pub prompts: PromptTemplates,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: None,
            memory: MemoryConfig::default(),
            llm: LlmConfig::default(),
            emotion: EmotionKeywords::default(),
            lexicon: ScoringLexicon::default(),
            prompts: PromptTemplates::default(),
        }
    }
}

impl AgentConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or parsed, an
    /// override is malformed, or the result fails validation.
    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    ///
    /// # Errors
    /// Same as [`AgentConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "loaded agent config file");
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> AgentResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.port = parse_number(PORT_ENV, &port)?;
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV) {
            self.llm.base_url = Some(url.clone());
            self.memory.embedding.base_url = Some(url);
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.llm.model = model;
        }
        if let Some(model) = lookup(EMBEDDING_MODEL_ENV) {
            self.memory.embedding.model = Some(model).filter(|m| !m.trim().is_empty());
        }
        if let Some(dims) = lookup(EMBEDDING_DIMS_ENV) {
            self.memory.embedding.ndims = parse_number(EMBEDDING_DIMS_ENV, &dims)?;
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.database_path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        Ok(())
    }

    /// Validate every section.
    ///
    /// # Errors
    /// Returns the first section error found.
    pub fn validate(&self) -> AgentResult<()> {
        if self.port == 0 {
            return Err(AgentError::InvalidConfig("port must be > 0".to_string()));
        }
        self.memory.validate()?;
        self.llm.validate()?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> AgentResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AgentError::InvalidConfig(format!("{key} is not a valid number: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.database_path.is_none());
        assert!(config.memory.embedding.model.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            (PORT_ENV, "8080"),
            (OLLAMA_URL_ENV, "http://10.0.0.2:11434"),
            (MODEL_ENV, "qwen3:4b"),
            (EMBEDDING_MODEL_ENV, "nomic-embed-text"),
            (EMBEDDING_DIMS_ENV, "768"),
            (DB_PATH_ENV, "/tmp/persona.db"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.llm.model, "qwen3:4b");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://10.0.0.2:11434"));
        assert_eq!(config.memory.embedding.base_url.as_deref(), Some("http://10.0.0.2:11434"));
        assert_eq!(config.memory.embedding.model.as_deref(), Some("nomic-embed-text"));
        assert_eq!(config.memory.embedding.ndims, 768);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/persona.db")));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(AgentConfig::from_lookup(lookup(&[(PORT_ENV, "eighty")])).is_err());
        assert!(AgentConfig::from_lookup(lookup(&[(OLLAMA_URL_ENV, "::nope")])).is_err());
        assert!(AgentConfig::from_lookup(lookup(&[(CONFIG_PATH_ENV, "/definitely/missing.json")])).is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"port": 4000, "memory": {"retrieval": {"top_k": 5}}}"#).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.memory.retrieval.top_k, 5);
        assert_eq!(config.memory.smart.candidate_multiplier, 2);
        assert!(config.validate().is_ok());
    }
}
