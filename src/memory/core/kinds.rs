//! Memory record classifiers: type, sentiment and priority.
//!
//! All three use stable `snake_case` identifiers so they survive a round trip
//! through the flat string metadata of the vector index.
//!
//! - [`MemoryType`] governs base expiry and retention weight (see
//!   [`crate::memory::core::config::MemoryTypeSettings`]).
//! - [`Sentiment`] scales the relevance score.
//! - [`Priority`] feeds both expiry and ranking. Unlike the other two it is a
//!   hard contract: an unknown label is rejected at insert time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::memory::core::errors::MemoryError;

/// Semantic type of a memory record.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A conversational turn.
    #[default]
    Conversation,
    /// A stable fact.
    Fact,
    /// A user preference.
    Preference,
    /// Short-lived situational context.
    Context,
    /// Long-lived profile information about the user.
    UserProfile,
    /// Operator or system setting; never expires on its own.
    SystemSetting,
}

impl MemoryType {
    /// All memory types in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Conversation,
        Self::Fact,
        Self::Preference,
        Self::Context,
        Self::UserProfile,
        Self::SystemSetting,
    ];

    /// Stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Context => "context",
            Self::UserProfile => "user_profile",
            Self::SystemSetting => "system_setting",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| MemoryError::InvalidMemoryItem(format!("unknown memory type: {s:?}")))
    }
}

/// Sentiment label attached to a record.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// Positive tone.
    Positive,
    /// Neutral tone.
    #[default]
    Neutral,
    /// Negative tone.
    Negative,
}

impl Sentiment {
    /// Stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Lenient parse: anything unrecognized is neutral.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention priority of a record.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Kept longest, ranked first on ties.
    High,
    /// Default.
    #[default]
    Medium,
    /// Shortest lived.
    Low,
}

impl Priority {
    /// Stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Ordinal used for tie-breaking (higher sorts first).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// Expiry multiplier applied by the dynamic expiry formula.
    #[must_use]
    pub const fn expiry_multiplier(self) -> f64 {
        match self {
            Self::High => 3.0,
            Self::Medium => 1.0,
            Self::Low => 0.3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(MemoryError::InvalidPriority(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_parse() {
        for kind in MemoryType::ALL {
            assert_eq!(MemoryType::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(MemoryType::from_str("dream").is_err());
    }

    #[test]
    fn test_priority_rejects_unknown_label() {
        assert_eq!(Priority::from_str("high").unwrap(), Priority::High);
        let err = Priority::from_str("urgent").unwrap_err();
        assert!(matches!(err, MemoryError::InvalidPriority(label) if label == "urgent"));
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_sentiment_lenient() {
        assert_eq!(Sentiment::parse_lenient("negative"), Sentiment::Negative);
        assert_eq!(Sentiment::parse_lenient("furious"), Sentiment::Neutral);
    }
}
