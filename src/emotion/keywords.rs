//! Keyword sets consulted by the emotion state machine.

use serde::{Deserialize, Serialize};

/// Keyword lists for each heuristic signal.
///
/// Matching is substring based on the lower-cased message; each distinct
/// keyword counts at most once per message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionKeywords {
    /// Each match adds affection.
    pub affection: Vec<String>,
    /// Each match adds stress.
    pub stress: Vec<String>,
    /// Each match adds envy.
    pub envy_triggers: Vec<String>,
    /// Any match selects the scholar mode.
    pub explain: Vec<String>,
    /// Any match selects the otaku mode.
    pub otaku: Vec<String>,
    /// Any match selects the hacker mode.
    pub hacker: Vec<String>,
    /// Any match selects the caring mode.
    pub sad: Vec<String>,
}

impl Default for EmotionKeywords {
    fn default() -> Self {
        Self {
            affection: words(&["喜欢", "爱", "关心", "在乎", "宝贝", "可爱"]),
            stress: words(&["辛苦", "累", "忙", "压力", "烦", "焦虑"]),
            envy_triggers: words(&["女朋友", "女友", "她", "别人"]),
            explain: words(&["为什么", "怎么", "是什么", "原理", "解释", "why", "how"]),
            otaku: words(&["机甲", "蜂黄泉", "玩具", "模型"]),
            hacker: words(&["电脑", "密码", "账户", "账单"]),
            sad: words(&["难过", "伤心", "烦", "郁闷", "崩溃", "压力"]),
        }
    }
}

impl EmotionKeywords {
    /// Lower-case every keyword once so matching can assume it.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.affection,
            &mut self.stress,
            &mut self.envy_triggers,
            &mut self.explain,
            &mut self.otaku,
            &mut self.hacker,
            &mut self.sad,
        ] {
            for keyword in list.iter_mut() {
                *keyword = keyword.trim().to_lowercase();
            }
            list.retain(|keyword| !keyword.is_empty());
            list.sort();
            list.dedup();
        }
        self
    }
}

/// Number of distinct keywords found in `text`.
#[must_use]
pub fn count_matches(keywords: &[String], text: &str) -> usize {
    keywords
        .iter()
        .filter(|keyword| text.contains(keyword.as_str()))
        .count()
}

/// Whether any keyword occurs in `text`.
#[must_use]
pub fn contains_any(keywords: &[String], text: &str) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword.as_str()))
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|word| (*word).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_matches_count_once() {
        let keywords = EmotionKeywords::default();
        assert_eq!(count_matches(&keywords.affection, "喜欢喜欢喜欢"), 1);
        assert_eq!(count_matches(&keywords.affection, "喜欢你，宝贝"), 2);
        assert_eq!(count_matches(&keywords.affection, ""), 0);
    }

    #[test]
    fn test_normalized_lowercases_and_dedups() {
        let keywords = EmotionKeywords {
            explain: vec!["WHY".to_string(), "why".to_string(), "  ".to_string()],
            ..EmotionKeywords::default()
        }
        .normalized();
        assert_eq!(keywords.explain, vec!["why".to_string()]);
        assert!(contains_any(&keywords.explain, "tell me why"));
    }
}
