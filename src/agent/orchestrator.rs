//! One conversational turn end to end.
//!
//! The request path loads the profile, picks the mode, saves the profile,
//! retrieves memories, builds the prompt and generates a reply (running any
//! requested tools and regenerating once). Summarizing the exchange, storing
//! it and scheduling maintenance happen afterwards on the background pool
//! and never delay the reply.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::config::AgentConfig;
use crate::agent::errors::AgentResult;
use crate::agent::prompt::PromptTemplates;
use crate::agent::summary::ConversationSummary;
use crate::emotion::machine::{EmotionStateMachine, RandomHeat, SystemClock};
use crate::emotion::mode::EmotionMode;
use crate::emotion::profile::EmotionProfile;
use crate::emotion::profile_store::{InMemoryProfileStore, ProfileStore, SqliteProfileStore};
use crate::llm::errors::LlmError;
use crate::llm::generator::{Generation, GenerationOptions, TextGenerator, TimeoutGenerator};
use crate::llm::ollama::OllamaGenerator;
use crate::memory::core::ids::UserId;
use crate::memory::core::record::NewMemory;
use crate::memory::embedding::embedder_from_config;
use crate::memory::engine::registry::MemoryStoreRegistry;
use crate::memory::engine::store::{MemoryServices, MemoryStore};
use crate::memory::scoring::importance::ImportanceScorer;
use crate::memory::storage::in_memory_index::InMemoryVectorIndex;
use crate::memory::storage::sqlite_index::SqliteVectorIndex;
use crate::memory::storage::vector_index::VectorIndex;
use crate::tools::builtins::{default_registry, variables_json};
use crate::tools::registry::ToolRegistry;

/// User text of the stored opening line.
pub const INIT_MARKER: &str = "[INIT]";
/// Category of the stored opening line.
pub const SYSTEM_CATEGORY: &str = "system";

/// Collaborators of the orchestrator.
#[derive(Clone)]
pub struct AgentServices {
    /// Mode selection.
    pub machine: Arc<EmotionStateMachine>,
    /// Profile persistence.
    pub profiles: Arc<dyn ProfileStore>,
    /// Per-user memory stores.
    pub memory: Arc<MemoryStoreRegistry>,
    /// Chat model.
    pub generator: Arc<dyn TextGenerator>,
    /// Tools offered to the model.
    pub tools: ToolRegistry,
    /// Prompt wording.
    pub templates: Arc<PromptTemplates>,
    /// Temperature of summarizer calls.
    pub summary_temperature: f64,
}

/// Reply to one turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReply {
    /// Reply text.
    pub response: String,
    /// Reasoning trace, only when requested and produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Mode chosen for this turn.
    pub current_state: EmotionMode,
    /// Human-readable mode description.
    pub state_description: String,
    /// Profile variables after the turn.
    pub emotional_variables: Value,
    /// Memories included in the prompt.
    pub memories_used: usize,
}

/// A turn reply plus the handle of its background summary task.
#[derive(Debug)]
pub struct Turn {
    /// What the user sees.
    pub reply: TurnReply,
    /// Summary tail; `None` when the fallback reply was used. Safe to drop.
    pub summary_task: Option<JoinHandle<()>>,
}

/// Generated opening line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Opener {
    /// Opening line.
    pub response: String,
    /// Mode the line was written in.
    pub current_state: EmotionMode,
    /// Human-readable mode description.
    pub state_description: String,
    /// Profile variables.
    pub emotional_variables: Value,
}

/// Result of asking for an opening line.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitialMessage {
    /// The user already has memories.
    Skipped,
    /// A new opener was generated and stored.
    Generated(Opener),
}

/// Result of a memory reset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemoryReset {
    /// Memories deleted.
    pub deleted: usize,
    /// Opener generated afterwards.
    pub initial: InitialMessage,
}

/// Drives conversational turns.
pub struct ConversationOrchestrator {
    services: AgentServices,
}

impl ConversationOrchestrator {
    /// Orchestrator over explicit collaborators.
    #[must_use]
    pub const fn new(services: AgentServices) -> Self {
        Self { services }
    }

    /// Build every collaborator from config.
    ///
    /// With a database path, profiles and vectors persist in `SQLite`;
    /// without one they live in memory.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a backend cannot be
    /// opened.
    pub async fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        config.validate()?;

        let embedder = embedder_from_config(&config.memory.embedding)?;
        let scorer = Arc::new(ImportanceScorer::new(&config.lexicon));
        let memory_services = MemoryServices::new(Arc::new(config.memory.clone()), embedder, scorer);

        let (index, profiles): (Arc<dyn VectorIndex>, Arc<dyn ProfileStore>) =
            match &config.database_path {
                Some(path) => {
                    info!(path = %path.display(), "using sqlite storage");
                    (
                        Arc::new(SqliteVectorIndex::open(path).await?),
                        Arc::new(SqliteProfileStore::open(path).await?),
                    )
                }
                None => {
                    info!("no database path configured, storage is in-memory");
                    (
                        Arc::new(InMemoryVectorIndex::new()),
                        Arc::new(InMemoryProfileStore::new()),
                    )
                }
            };

        let machine = Arc::new(EmotionStateMachine::new(
            config.emotion.clone(),
            RandomHeat,
            SystemClock,
        ));
        let generator = TimeoutGenerator::new(
            OllamaGenerator::new(&config.llm)?,
            Duration::from_secs(config.llm.timeout_seconds),
        );

        Ok(Self::new(AgentServices {
            tools: default_registry(Arc::clone(&machine)),
            machine,
            profiles,
            memory: Arc::new(MemoryStoreRegistry::new(index, memory_services)),
            generator: Arc::new(generator),
            templates: Arc::new(config.prompts.clone()),
            summary_temperature: config.llm.summary_temperature,
        }))
    }

    /// Memory registry, shared with the periodic cleanup.
    #[must_use]
    pub fn memory(&self) -> Arc<MemoryStoreRegistry> {
        Arc::clone(&self.services.memory)
    }

    /// Answer one message.
    ///
    /// Generation failures are answered with the fallback reply; memory
    /// retrieval failures are answered without memory context.
    ///
    /// # Errors
    /// Returns an error if the profile cannot be loaded or saved.
    pub async fn handle_turn(
        &self,
        user: &UserId,
        message: &str,
        include_thinking: bool,
    ) -> AgentResult<Turn> {
        let services = &self.services;
        let mut profile = services.profiles.load_profile(user).await?;
        let mode = services.machine.determine_mode(&mut profile, Some(message));
        services.profiles.save_profile(user, profile).await?;

        let store = services.memory.store_for(user).await;
        let top_k = services.memory.services().config.retrieval.top_k;
        let memories = match store.smart_retrieve(message, mode, top_k).await {
            Ok(memories) => memories,
            Err(err) => {
                warn!(user = %user, %err, "memory retrieval failed, replying without context");
                Vec::new()
            }
        };

        let prompt = services.templates.chat_prompt(mode, &memories, message);
        let (generation, summary_task) = match self.reply(&prompt).await {
            Ok(generation) => {
                let task = self.spawn_summary(user, message, &generation.text, mode, store);
                (generation, Some(task))
            }
            Err(err) => {
                warn!(user = %user, %err, "generation failed, using fallback reply");
                (
                    Generation {
                        text: services.templates.fallback_reply.clone(),
                        thinking: None,
                    },
                    None,
                )
            }
        };

        info!(user = %user, mode = %mode, memories = memories.len(), "turn answered");
        Ok(Turn {
            reply: TurnReply {
                response: generation.text,
                thinking: generation.thinking.filter(|_| include_thinking),
                current_state: mode,
                state_description: mode.description().to_string(),
                emotional_variables: variables_json(&profile),
                memories_used: memories.len(),
            },
            summary_task,
        })
    }

    /// Generate and store an opening line unless the user has memories.
    ///
    /// # Errors
    /// Returns an error if the profile or the memory store fails.
    pub async fn initial_message(&self, user: &UserId) -> AgentResult<InitialMessage> {
        let store = self.services.memory.store_for(user).await;
        if store.has_any().await? {
            debug!(user = %user, "memories exist, skipping opener");
            return Ok(InitialMessage::Skipped);
        }
        self.write_opener(user, &store).await
    }

    /// Delete every memory of `user`, then generate a fresh opener.
    ///
    /// # Errors
    /// Returns an error if the profile or the memory store fails.
    pub async fn reset_memory(&self, user: &UserId) -> AgentResult<MemoryReset> {
        let store = self.services.memory.store_for(user).await;
        let report = store.clear_all().await?;
        info!(user = %user, deleted = report.deleted, "memories cleared");
        let initial = self.write_opener(user, &store).await?;
        Ok(MemoryReset {
            deleted: report.deleted,
            initial,
        })
    }

    async fn write_opener(&self, user: &UserId, store: &MemoryStore) -> AgentResult<InitialMessage> {
        let services = &self.services;
        let profile = services.profiles.load_profile(user).await?;
        let mode = profile.mode();
        let prompt = services.templates.opener_prompt(mode);

        let text = match services.generator.generate(&prompt, GenerationOptions::default()).await {
            Ok(generation) if !generation.text.trim().is_empty() => generation.text,
            Ok(_) => services.templates.fallback_opener.clone(),
            Err(err) => {
                warn!(user = %user, %err, "opener generation failed, using fallback");
                services.templates.fallback_opener.clone()
            }
        };

        store
            .add(NewMemory::conversation(INIT_MARKER, text.clone(), mode).with_category(SYSTEM_CATEGORY))
            .await?;
        Ok(InitialMessage::Generated(opener(text, &profile)))
    }

    async fn reply(&self, prompt: &str) -> AgentResult<Generation> {
        let services = &self.services;
        let specs = services.tools.specs();
        let first = services
            .generator
            .generate_with_tools(prompt, &specs, GenerationOptions::default())
            .await?;

        let generation = if first.tool_calls.is_empty() {
            Generation {
                text: first.text,
                thinking: first.thinking,
            }
        } else {
            let outcomes = services.tools.execute_all(&first.tool_calls);
            debug!(calls = outcomes.len(), "tool calls executed, regenerating");
            let followup = services
                .templates
                .with_tool_results(prompt, outcomes.iter().map(|outcome| &outcome.result));
            let second = services
                .generator
                .generate(&followup, GenerationOptions::default())
                .await?;
            Generation {
                text: second.text,
                thinking: second.thinking.or(first.thinking),
            }
        };

        if generation.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(generation)
    }

    fn spawn_summary(
        &self,
        user: &UserId,
        message: &str,
        reply: &str,
        mode: EmotionMode,
        store: Arc<MemoryStore>,
    ) -> JoinHandle<()> {
        let tail = SummaryTail {
            user: user.clone(),
            user_text: message.to_string(),
            reply_text: reply.to_string(),
            mode,
            store,
            services: self.services.clone(),
        };
        self.services
            .memory
            .services()
            .tasks
            .spawn("conversation_summary", tail.run())
    }
}

fn opener(text: String, profile: &EmotionProfile) -> Opener {
    let mode = profile.mode();
    Opener {
        response: text,
        current_state: mode,
        state_description: mode.description().to_string(),
        emotional_variables: variables_json(profile),
    }
}

/// Everything the background summary needs, owned.
struct SummaryTail {
    user: UserId,
    user_text: String,
    reply_text: String,
    mode: EmotionMode,
    store: Arc<MemoryStore>,
    services: AgentServices,
}

impl SummaryTail {
    async fn run(self) -> AgentResult<()> {
        let Self {
            user,
            user_text,
            reply_text,
            mode,
            store,
            services,
        } = self;

        let prompt = services.templates.summary_prompt(&user_text, &reply_text, mode);
        let raw = services
            .generator
            .generate(
                &prompt,
                GenerationOptions::with_temperature(services.summary_temperature),
            )
            .await?;

        let stored_reply = match ConversationSummary::parse(&raw.text) {
            Ok(summary) => {
                if !summary.delta.is_empty() {
                    let mut profile = services.profiles.load_profile(&user).await?;
                    services.machine.update_from_summary(&mut profile, &summary.delta);
                    services.profiles.save_profile(&user, profile).await?;
                }
                debug!(user = %user, user_emotion = %summary.user_emotion, ai_emotion = %summary.ai_emotion, "summary applied");
                summary.summary
            }
            Err(err) => {
                warn!(user = %user, %err, "unusable summary, storing the reply as is");
                reply_text
            }
        };

        store
            .add(NewMemory::conversation(user_text, stored_reply, mode))
            .await?;
        let _maintenance = store.schedule_maintenance();
        Ok(())
    }
}
