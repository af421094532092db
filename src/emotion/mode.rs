//! Discrete emotional modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete affective mode driving persona behaviour.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum EmotionMode {
    /// Default "little sister" mode.
    #[default]
    S1,
    /// Scholar mode.
    S2,
    /// Caring, older-sibling mode.
    S3,
    /// Jealous mode.
    S4,
    /// Otaku mode.
    S5,
    /// Hacker mode.
    S6,
    /// Overheated mode.
    S7,
    /// Vulnerable, night-only mode.
    S8,
    /// No mode assigned.
    #[serde(rename = "idle")]
    Idle,
}

/// Error returned when a mode label is not recognized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmotionModeParseError(pub String);

impl fmt::Display for EmotionModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown emotion mode: {:?}", self.0)
    }
}

impl std::error::Error for EmotionModeParseError {}

impl EmotionMode {
    /// All modes.
    pub const ALL: [Self; 9] = [
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
        Self::S8,
        Self::Idle,
    ];

    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
            Self::S4 => "S4",
            Self::S5 => "S5",
            Self::S6 => "S6",
            Self::S7 => "S7",
            Self::S8 => "S8",
            Self::Idle => "idle",
        }
    }

    /// Short persona-facing description of the mode.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::S1 => "妹妹模式：天真可爱、贪吃、撒娇、耍赖、怕被凶",
            Self::S2 => "学者模式：冷静、成熟、专业、逻辑严密",
            Self::S3 => "姐姐感：温柔、安稳、有点像恋人照顾你",
            Self::S4 => "恋爱萌芽：吃醋、小情绪",
            Self::S5 => "宅女模式：机甲狂热，强行安利模型",
            Self::S6 => "黑进你电脑模式：暗示自己偷看了什么但不直接说",
            Self::S7 => "过热模式：逻辑失衡、语速变快、说奇怪的话",
            Self::S8 => "脆弱依赖模式：坦白关于爱、孤独、害怕被丢下的情绪",
            Self::Idle => "未知状态",
        }
    }

    /// Lenient parse used when decoding stored metadata: unknown labels are `Idle`.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Idle)
    }
}

impl fmt::Display for EmotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionMode {
    type Err = EmotionModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EmotionModeParseError(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!("S7".parse::<EmotionMode>().unwrap(), EmotionMode::S7);
        assert_eq!("idle".parse::<EmotionMode>().unwrap(), EmotionMode::Idle);
        assert!("S9".parse::<EmotionMode>().is_err());
        assert_eq!(EmotionMode::parse_lenient("S9"), EmotionMode::Idle);
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&EmotionMode::Idle).unwrap();
        assert_eq!(json, "\"idle\"");
        let mode: EmotionMode = serde_json::from_str("\"S4\"").unwrap();
        assert_eq!(mode, EmotionMode::S4);
    }
}
