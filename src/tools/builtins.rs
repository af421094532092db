//! Built-in tools: the local clock and a stateless emotion check.

use std::sync::Arc;

use chrono::Local;
use serde_json::{Value, json};

use crate::emotion::machine::EmotionStateMachine;
use crate::emotion::mode::EmotionMode;
use crate::emotion::profile::EmotionProfile;
use crate::tools::registry::{Tool, ToolError, ToolRegistry};

/// Name of the clock tool.
pub const CURRENT_TIME_TOOL: &str = "getCurrentTime";
/// Name of the emotion check tool.
pub const EMOTION_TOOL: &str = "emotion_state_machine";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the local time as `{"currentTime": "YYYY-MM-DD HH:MM:SS"}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        CURRENT_TIME_TOOL
    }

    fn description(&self) -> &str {
        "获取当前时间"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(json!({ "currentTime": Local::now().format(TIME_FORMAT).to_string() }))
    }
}

/// Runs mode selection for a message against a fresh default profile.
///
/// The caller's own profile is never touched.
pub struct EmotionStateTool {
    machine: Arc<EmotionStateMachine>,
}

impl EmotionStateTool {
    /// Tool backed by `machine`.
    #[must_use]
    pub const fn new(machine: Arc<EmotionStateMachine>) -> Self {
        Self { machine }
    }
}

impl Tool for EmotionStateTool {
    fn name(&self) -> &str {
        EMOTION_TOOL
    }

    fn description(&self) -> &str {
        "千夜智子情感状态机工具"
    }

    fn parameters(&self) -> Value {
        let modes: Vec<&str> = EmotionMode::ALL.iter().map(|mode| mode.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "用户的消息内容"},
                "state": {"type": "string", "description": "当前状态", "enum": modes}
            },
            "required": ["message"]
        })
    }

    fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: EMOTION_TOOL.to_string(),
                reason: "message must be a string".to_string(),
            })?;

        let mut profile = EmotionProfile::default();
        let mode = self.machine.determine_mode(&mut profile, Some(message));
        Ok(json!({
            "new_state": mode.as_str(),
            "state_description": mode.description(),
            "variables": variables_json(&profile),
        }))
    }
}

/// Profile variables as a JSON object.
#[must_use]
pub fn variables_json(profile: &EmotionProfile) -> Value {
    json!({
        "affection": profile.affection(),
        "heat": profile.heat(),
        "sleepy": profile.sleepy(),
        "envy": profile.envy(),
        "stress": profile.stress(),
    })
}

/// Registry with both built-ins.
#[must_use]
pub fn default_registry(machine: Arc<EmotionStateMachine>) -> ToolRegistry {
    ToolRegistry::new()
        .with(CurrentTimeTool)
        .with(EmotionStateTool::new(machine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::keywords::EmotionKeywords;
    use crate::emotion::machine::{FixedClock, FixedHeat};

    fn machine() -> Arc<EmotionStateMachine> {
        Arc::new(EmotionStateMachine::new(
            EmotionKeywords::default(),
            FixedHeat(0),
            FixedClock(12),
        ))
    }

    #[test]
    fn test_current_time_format() {
        let out = CurrentTimeTool.invoke(Value::Null).unwrap();
        let stamp = out["currentTime"].as_str().unwrap();
        assert_eq!(stamp.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIME_FORMAT).is_ok());
    }

    #[test]
    fn test_emotion_check_uses_fresh_profile() {
        let registry = default_registry(machine());
        assert_eq!(registry.names(), vec![EMOTION_TOOL, CURRENT_TIME_TOOL]);

        let out = registry
            .invoke(EMOTION_TOOL, json!({"message": "为什么天空是蓝的"}))
            .unwrap();
        assert_eq!(out["new_state"], json!("S2"));
        assert_eq!(out["variables"]["affection"], json!(50));

        // Same message again: still computed from the default profile.
        let again = registry
            .invoke(EMOTION_TOOL, json!({"message": "为什么天空是蓝的"}))
            .unwrap();
        assert_eq!(again["variables"], out["variables"]);
    }

    #[test]
    fn test_emotion_check_requires_message() {
        let tool = EmotionStateTool::new(machine());
        assert!(matches!(
            tool.invoke(json!({"state": "S1"})),
            Err(ToolError::InvalidArguments { .. })
        ));
    }
}
