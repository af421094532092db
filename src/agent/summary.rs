//! Parsing of the summarizer's JSON output.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::agent::errors::{AgentError, AgentResult};
use crate::emotion::profile::{SUMMARY_DELTA_LIMIT, SummaryDelta};

/// Soft limit on the summary text, in characters.
pub const SUMMARY_SOFT_LIMIT: usize = 50;

const DELTA_FIELDS: [&str; 3] = ["affection_change", "heat_change", "sleepy_change"];
const TEXT_FIELDS: [&str; 3] = ["summary", "user_emotion", "ai_emotion"];

/// A validated summary of one exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    /// Short summary of the exchange.
    pub summary: String,
    /// Dominant user emotion.
    pub user_emotion: String,
    /// Dominant assistant emotion.
    pub ai_emotion: String,
    /// Variable changes to apply to the profile.
    pub delta: SummaryDelta,
}

impl ConversationSummary {
    /// Parse raw model output.
    ///
    /// Markdown code fences are stripped. Every field must be present, text
    /// fields must be strings and delta fields integers in `[-5, 5]`. A
    /// summary longer than the soft limit is kept with a warning.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidSummary` when the output is not a JSON
    /// object or a field is missing or out of range.
    pub fn parse(raw: &str) -> AgentResult<Self> {
        let body = strip_fences(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|err| AgentError::InvalidSummary(format!("not json: {err}")))?;
        if !value.is_object() {
            return Err(AgentError::InvalidSummary("expected a json object".to_string()));
        }

        for field in TEXT_FIELDS.iter().chain(DELTA_FIELDS.iter()) {
            if value.get(field).is_none() {
                return Err(AgentError::InvalidSummary(format!("missing field {field}")));
            }
        }
        for field in DELTA_FIELDS {
            let in_range = value[field]
                .as_i64()
                .is_some_and(|delta| (-SUMMARY_DELTA_LIMIT..=SUMMARY_DELTA_LIMIT).contains(&delta));
            if !in_range {
                return Err(AgentError::InvalidSummary(format!(
                    "{field} must be an integer in [-{SUMMARY_DELTA_LIMIT}, {SUMMARY_DELTA_LIMIT}], got {}",
                    value[field]
                )));
            }
        }
        let text = |field: &str| -> AgentResult<String> {
            value[field]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| AgentError::InvalidSummary(format!("{field} must be a string")))
        };

        let summary = Self {
            summary: text("summary")?,
            user_emotion: text("user_emotion")?,
            ai_emotion: text("ai_emotion")?,
            delta: SummaryDelta::from_json(&value),
        };
        let chars = summary.summary.chars().count();
        if chars > SUMMARY_SOFT_LIMIT {
            warn!(chars, "conversation summary longer than expected");
        }
        Ok(summary)
    }
}

/// Remove a surrounding ```json … ``` or ``` … ``` fence.
#[must_use]
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_suffix("```") else {
        return trimmed;
    };
    inner
        .strip_prefix("```json")
        .or_else(|| inner.strip_prefix("```"))
        .map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"summary":"用户邀请智子睡觉，智子害羞接受","user_emotion":"亲昵","ai_emotion":"害羞","affection_change":3,"heat_change":2,"sleepy_change":1}"#;

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = ConversationSummary::parse(VALID).unwrap();
        assert_eq!(plain.ai_emotion, "害羞");
        assert_eq!(plain.delta.affection_change, Some(3));
        assert_eq!(plain.delta.sleepy_change, Some(1));

        let fenced = ConversationSummary::parse(&format!("```json\n{VALID}\n```")).unwrap();
        assert_eq!(fenced, plain);
        let bare_fence = ConversationSummary::parse(&format!("```\n{VALID}\n```")).unwrap();
        assert_eq!(bare_fence, plain);
    }

    #[test]
    fn test_rejects_missing_and_out_of_range_fields() {
        let missing = r#"{"summary":"x","user_emotion":"a","ai_emotion":"b","affection_change":1,"heat_change":0}"#;
        assert!(matches!(
            ConversationSummary::parse(missing),
            Err(AgentError::InvalidSummary(reason)) if reason.contains("sleepy_change")
        ));

        let too_big = VALID.replace("\"heat_change\":2", "\"heat_change\":9");
        assert!(ConversationSummary::parse(&too_big).is_err());

        let fractional = VALID.replace("\"heat_change\":2", "\"heat_change\":1.5");
        assert!(ConversationSummary::parse(&fractional).is_err());

        assert!(ConversationSummary::parse("智子觉得很开心").is_err());
        assert!(ConversationSummary::parse("[1, 2]").is_err());
    }

    #[test]
    fn test_strip_fences_leaves_unfenced_text() {
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
    }
}
