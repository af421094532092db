//! Text generation abstraction, reasoning-trace extraction and a timeout
//! wrapper.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::errors::{LlmError, LlmResult};

/// Boxed future type for generator operations.
pub type GenerateFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default upper bound on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call knobs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GenerationOptions {
    /// Overrides the generator's default temperature.
    pub temperature: Option<f64>,
}

impl GenerationOptions {
    /// Options with a fixed temperature.
    #[must_use]
    pub const fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// A plain completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Generation {
    /// Reply text with any reasoning trace removed.
    pub text: String,
    /// Reasoning trace, when the model produced one.
    pub thinking: Option<String>,
}

/// A tool the model may call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider call id.
    pub id: String,
    /// Requested tool name.
    pub name: String,
    /// Arguments as sent by the model.
    pub arguments: Value,
}

/// A completion that may carry tool calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ToolGeneration {
    /// Reply text (possibly empty when only tools were requested).
    pub text: String,
    /// Reasoning trace, when the model produced one.
    pub thinking: Option<String>,
    /// Requested tool calls, in order.
    pub tool_calls: Vec<ToolCall>,
}

/// Prompt → text.
pub trait TextGenerator: Send + Sync {
    /// Generate a reply.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<Generation>>;

    /// Generate a reply with tools available.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn generate_with_tools<'a>(
        &'a self,
        prompt: &'a str,
        tools: &'a [ToolSpec],
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<ToolGeneration>>;
}

/// Splits `<think>…</think>` traces out of raw model output.
#[derive(Clone, Debug)]
pub struct ThinkTags {
    pattern: Regex,
}

impl ThinkTags {
    /// Compile the tag pattern.
    ///
    /// # Errors
    /// Returns `LlmError::InvalidConfig` if the pattern fails to compile.
    pub fn new() -> LlmResult<Self> {
        let pattern = Regex::new(r"(?s)<think>(.*?)</think>")
            .map_err(|err| LlmError::InvalidConfig(format!("invalid think pattern: {err}")))?;
        Ok(Self { pattern })
    }

    /// Reply text and the joined reasoning trace.
    #[must_use]
    pub fn split(&self, raw: &str) -> Generation {
        let traces: Vec<&str> = self
            .pattern
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|trace| !trace.is_empty())
            .collect();
        let text = self.pattern.replace_all(raw, "").trim().to_string();
        Generation {
            text,
            thinking: (!traces.is_empty()).then(|| traces.join("\n")),
        }
    }
}

/// Bounds every call of the wrapped generator.
pub struct TimeoutGenerator<G> {
    inner: G,
    limit: Duration,
}

impl<G> TimeoutGenerator<G> {
    /// Wrap `inner` with `limit`.
    #[must_use]
    pub const fn new(inner: G, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// Wrap `inner` with the default 30 second limit.
    #[must_use]
    pub const fn with_default_limit(inner: G) -> Self {
        Self::new(inner, DEFAULT_GENERATION_TIMEOUT)
    }

    /// Configured limit.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }
}

impl<G: TextGenerator> TextGenerator for TimeoutGenerator<G> {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<Generation>> {
        Box::pin(async move {
            tokio::time::timeout(self.limit, self.inner.generate(prompt, options))
                .await
                .map_err(|_| LlmError::Timeout(self.limit))?
        })
    }

    fn generate_with_tools<'a>(
        &'a self,
        prompt: &'a str,
        tools: &'a [ToolSpec],
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<ToolGeneration>> {
        Box::pin(async move {
            tokio::time::timeout(self.limit, self.inner.generate_with_tools(prompt, tools, options))
                .await
                .map_err(|_| LlmError::Timeout(self.limit))?
        })
    }
}
