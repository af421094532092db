//! Text generation: the generator trait, the Ollama backend and the timeout
//! wrapper.

pub mod config;
pub mod errors;
pub mod generator;
pub mod ollama;

pub use config::LlmConfig;
pub use errors::{LlmError, LlmResult};
pub use generator::{
    DEFAULT_GENERATION_TIMEOUT, GenerateFuture, Generation, GenerationOptions, TextGenerator,
    ThinkTags, TimeoutGenerator, ToolCall, ToolGeneration, ToolSpec,
};
pub use ollama::OllamaGenerator;
