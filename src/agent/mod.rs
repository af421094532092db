//! Conversation layer: configuration, prompt assembly, summary parsing and
//! the per-turn orchestrator.

pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod prompt;
pub mod summary;

pub use config::AgentConfig;
pub use errors::{AgentError, AgentResult};
pub use orchestrator::{
    AgentServices, ConversationOrchestrator, InitialMessage, MemoryReset, Opener, Turn, TurnReply,
};
pub use prompt::PromptTemplates;
pub use summary::ConversationSummary;
