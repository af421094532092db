//! HTTP route handlers for the persona agent API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::agent::errors::AgentError;
use crate::agent::orchestrator::{InitialMessage, MemoryReset, TurnReply};
use crate::memory::core::ids::UserId;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/chat/initial", post(initial_message))
        .route("/memory/clear", post(clear_memory))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "persona-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User identifier.
    pub user: String,
    /// The user's message.
    pub message: String,
    /// Return the model's reasoning trace.
    #[serde(default)]
    pub include_thinking: bool,
}

/// Request naming only a user.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    /// User identifier.
    pub user: String,
}

type ApiError = (StatusCode, String);

fn api_error(err: AgentError) -> ApiError {
    match err {
        AgentError::InvalidUser(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        other => {
            error!(err = %other, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Agent error: {other}"))
        }
    }
}

fn parse_user(raw: &str) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(|err| api_error(err.into()))
}

/// Answer one message.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let user = parse_user(&request.user)?;
    let turn = state
        .agent
        .handle_turn(&user, &request.message, request.include_thinking)
        .await
        .map_err(api_error)?;
    Ok(Json(turn.reply))
}

/// Opening line for a user without memories.
async fn initial_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserRequest>,
) -> Result<Json<InitialMessage>, ApiError> {
    let user = parse_user(&request.user)?;
    let initial = state.agent.initial_message(&user).await.map_err(api_error)?;
    Ok(Json(initial))
}

/// Delete a user's memories and start over.
async fn clear_memory(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserRequest>,
) -> Result<Json<MemoryReset>, ApiError> {
    let user = parse_user(&request.user)?;
    let reset = state.agent.reset_memory(&user).await.map_err(api_error)?;
    Ok(Json(reset))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::agent::orchestrator::{AgentServices, ConversationOrchestrator};
    use crate::agent::prompt::PromptTemplates;
    use crate::emotion::keywords::EmotionKeywords;
    use crate::emotion::machine::{EmotionStateMachine, FixedClock, FixedHeat};
    use crate::emotion::profile_store::InMemoryProfileStore;
    use crate::llm::errors::LlmResult;
    use crate::llm::generator::{
        GenerateFuture, Generation, GenerationOptions, TextGenerator, ToolGeneration, ToolSpec,
    };
    use crate::memory::core::config::MemoryConfig;
    use crate::memory::embedding::hashing::HashingEmbedder;
    use crate::memory::engine::registry::MemoryStoreRegistry;
    use crate::memory::engine::store::MemoryServices;
    use crate::memory::scoring::importance::ImportanceScorer;
    use crate::memory::storage::in_memory_index::InMemoryVectorIndex;
    use crate::tools::builtins::default_registry;

    struct Fixed;

    impl TextGenerator for Fixed {
        fn generate<'a>(
            &'a self,
            _prompt: &'a str,
            _options: GenerationOptions,
        ) -> GenerateFuture<'a, LlmResult<Generation>> {
            Box::pin(async {
                Ok(Generation {
                    text: "哥哥好～".to_string(),
                    thinking: None,
                })
            })
        }

        fn generate_with_tools<'a>(
            &'a self,
            _prompt: &'a str,
            _tools: &'a [ToolSpec],
            _options: GenerationOptions,
        ) -> GenerateFuture<'a, LlmResult<ToolGeneration>> {
            Box::pin(async {
                Ok(ToolGeneration {
                    text: "哥哥好～".to_string(),
                    thinking: Some("trace".to_string()),
                    tool_calls: Vec::new(),
                })
            })
        }
    }

    fn router() -> Router {
        let machine = Arc::new(EmotionStateMachine::new(
            EmotionKeywords::default(),
            FixedHeat(0),
            FixedClock(12),
        ));
        let memory_services = MemoryServices::new(
            Arc::new(MemoryConfig::default()),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(ImportanceScorer::default()),
        );
        let agent = ConversationOrchestrator::new(AgentServices {
            tools: default_registry(Arc::clone(&machine)),
            machine,
            profiles: Arc::new(InMemoryProfileStore::new()),
            memory: Arc::new(MemoryStoreRegistry::new(
                Arc::new(InMemoryVectorIndex::new()),
                memory_services,
            )),
            generator: Arc::new(Fixed),
            templates: Arc::new(PromptTemplates::default()),
            summary_temperature: 0.1,
        });
        crate::server::app(AppState::new(agent))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_returns_reply_and_state() {
        let (status, body) = post_json(
            router(),
            "/chat",
            serde_json::json!({"user": "alice", "message": "为什么下雨", "include_thinking": true}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "哥哥好～");
        assert_eq!(body["current_state"], "S2");
        assert_eq!(body["thinking"], "trace");
        assert!(body["emotional_variables"].is_object());
    }

    #[tokio::test]
    async fn test_invalid_user_is_bad_request() {
        let (status, _) = post_json(
            router(),
            "/chat",
            serde_json::json!({"user": "   ", "message": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_initial_then_clear() {
        let app = router();
        let (status, body) = post_json(app.clone(), "/chat/initial", serde_json::json!({"user": "bob"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "generated");

        let (_, again) = post_json(app.clone(), "/chat/initial", serde_json::json!({"user": "bob"})).await;
        assert_eq!(again["status"], "skipped");

        let (status, reset) = post_json(app, "/memory/clear", serde_json::json!({"user": "bob"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["deleted"], 1);
        assert_eq!(reset["initial"]["status"], "generated");
    }
}
