//! Tool contract and name-based dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::generator::{ToolCall, ToolSpec};

/// Tool invocation error type.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under the requested name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments did not match the tool's schema.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// What was wrong.
        reason: String,
    },
    /// The tool ran and failed.
    #[error("tool {tool} failed: {reason}")]
    Failed {
        /// Tool name.
        tool: String,
        /// Failure detail.
        reason: String,
    },
}

/// A callable tool exposed to the model.
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;
    /// What the tool does.
    fn description(&self) -> &str;
    /// JSON schema of the arguments.
    fn parameters(&self) -> Value;
    /// Run the tool.
    ///
    /// # Errors
    /// Returns an error if the arguments are invalid or the tool fails.
    fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

/// Outcome of one requested call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    /// Call that was executed.
    pub call: ToolCall,
    /// Tool result, or `{"error": …}` when the call failed.
    pub result: Value,
}

/// Tools by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool`, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Builder form of [`ToolRegistry::register`].
    #[must_use]
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Specs for every registered tool.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    /// Returns `ToolError::UnknownTool` if nothing is registered under `name`,
    /// or whatever the tool itself returns.
    pub fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "invoking tool");
        tool.invoke(args)
    }

    /// Execute every call; failures become `{"error": …}` results.
    #[must_use]
    pub fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        calls
            .iter()
            .map(|call| {
                let result = self
                    .invoke(&call.name, normalize_arguments(&call.arguments))
                    .unwrap_or_else(|err| {
                        warn!(tool = %call.name, %err, "tool call failed");
                        serde_json::json!({ "error": err.to_string() })
                    });
                ToolOutcome {
                    call: call.clone(),
                    result,
                }
            })
            .collect()
    }
}

/// Some models send arguments as a JSON-encoded string.
fn normalize_arguments(arguments: &Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| arguments.clone()),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "返回参数"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn invoke(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_dispatch_by_name() {
        let registry = ToolRegistry::new().with(Echo);
        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.invoke("echo", json!({"a": 1})).unwrap(), json!({"a": 1}));
        assert!(matches!(
            registry.invoke("missing", Value::Null),
            Err(ToolError::UnknownTool(name)) if name == "missing"
        ));
        assert_eq!(registry.specs()[0].name, "echo");
    }

    #[test]
    fn test_execute_all_reports_failures_inline() {
        let registry = ToolRegistry::new().with(Echo);
        let outcomes = registry.execute_all(&[
            call("echo", json!("{\"x\":2}")),
            call("nope", Value::Null),
        ]);
        assert_eq!(outcomes[0].result, json!({"x": 2}));
        assert!(outcomes[1].result["error"].as_str().unwrap().contains("nope"));
    }
}
