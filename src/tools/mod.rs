//! Tools the model can call during a turn.

pub mod builtins;
pub mod registry;

pub use builtins::{
    CURRENT_TIME_TOOL, CurrentTimeTool, EMOTION_TOOL, EmotionStateTool, default_registry,
    variables_json,
};
pub use registry::{Tool, ToolError, ToolOutcome, ToolRegistry};
