//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::errors::AgentResult;
use crate::agent::orchestrator::ConversationOrchestrator;

/// Shared application state.
pub struct AppState {
    /// Conversation orchestrator.
    pub agent: ConversationOrchestrator,
}

impl AppState {
    /// Wrap an existing orchestrator.
    #[must_use]
    pub fn new(agent: ConversationOrchestrator) -> Arc<Self> {
        Arc::new(Self { agent })
    }

    /// Build the orchestrator from config.
    ///
    /// # Errors
    /// Returns an error if a backend cannot be created.
    pub async fn from_config(config: &AgentConfig) -> AgentResult<Arc<Self>> {
        let agent = ConversationOrchestrator::from_config(config).await?;
        Ok(Self::new(agent))
    }
}
