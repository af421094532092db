//! Ollama completion backend through Rig.

use reqwest::Client as ReqwestClient;
use rig::client::{CompletionClient, Nothing};
use rig::completion::{CompletionModel, ToolDefinition};
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::llm::config::LlmConfig;
use crate::llm::errors::LlmResult;
use crate::llm::generator::{
    GenerateFuture, Generation, GenerationOptions, TextGenerator, ThinkTags, ToolCall,
    ToolGeneration, ToolSpec,
};

type OllamaCompletionModel = ollama::CompletionModel<ReqwestClient>;

/// Ollama chat model.
#[derive(Clone)]
pub struct OllamaGenerator {
    model: OllamaCompletionModel,
    temperature: f64,
    max_tokens: Option<u64>,
    think: ThinkTags,
}

impl OllamaGenerator {
    /// Build a generator from config.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the client cannot be
    /// built.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        config.validate()?;
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build()?;
        let model = client.completion_model(config.model.clone());
        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            think: ThinkTags::new()?,
        })
    }

    async fn complete(
        &self,
        prompt: &str,
        tools: Vec<ToolDefinition>,
        options: GenerationOptions,
    ) -> LlmResult<(String, Vec<ToolCall>)> {
        let request = self
            .model
            .completion_request(prompt.to_string())
            .temperature(options.temperature.unwrap_or(self.temperature))
            .max_tokens_opt(self.max_tokens)
            .tools(tools)
            .build();

        let response = self.model.completion(request).await?;
        let mut text = String::new();
        let mut calls = Vec::new();
        for content in response.choice.iter() {
            match content {
                AssistantContent::Text(part) => text.push_str(&part.text),
                AssistantContent::ToolCall(call) => calls.push(ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                }),
                _ => {}
            }
        }
        debug!(chars = text.chars().count(), tool_calls = calls.len(), "ollama completion finished");
        Ok((text, calls))
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<Generation>> {
        Box::pin(async move {
            let (raw, _) = self.complete(prompt, Vec::new(), options).await?;
            Ok(self.think.split(&raw))
        })
    }

    fn generate_with_tools<'a>(
        &'a self,
        prompt: &'a str,
        tools: &'a [ToolSpec],
        options: GenerationOptions,
    ) -> GenerateFuture<'a, LlmResult<ToolGeneration>> {
        Box::pin(async move {
            let definitions = tools
                .iter()
                .map(|tool| ToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                })
                .collect();
            let (raw, tool_calls) = self.complete(prompt, definitions, options).await?;
            let Generation { text, thinking } = self.think.split(&raw);
            Ok(ToolGeneration {
                text,
                thinking,
                tool_calls,
            })
        })
    }
}
