//! Importance of a new memory, computed once at creation time.

use std::collections::HashSet;

use serde::Serialize;

use crate::emotion::mode::EmotionMode;
use crate::memory::scoring::lexicon::{ScoringLexicon, char_len, segment};

const BASE: f64 = 0.3;
const MIN_IMPORTANCE: f64 = 0.1;
const MAX_IMPORTANCE: f64 = 1.0;

const W_EMOTION: f64 = 0.25;
const W_UNIQUENESS: f64 = 0.2;
const W_INTERACTION: f64 = 0.15;
const W_DENSITY: f64 = 0.15;
const W_TIME: f64 = 0.05;
const W_KEYWORDS: f64 = 0.2;

/// Per-factor values behind one importance score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ImportanceBreakdown {
    /// Mode-driven emotional intensity.
    pub emotional_intensity: f64,
    /// Share of non-common tokens.
    pub topic_uniqueness: f64,
    /// Length and shape of the exchange.
    pub interaction_quality: f64,
    /// Share of content words.
    pub information_density: f64,
    /// Freshness at creation; always `1.0`.
    pub time_relevance: f64,
    /// Important-keyword hits.
    pub keyword_relevance: f64,
}

impl ImportanceBreakdown {
    /// Final clamped importance.
    #[must_use]
    pub fn total(&self) -> f64 {
        let weighted = W_EMOTION * self.emotional_intensity
            + W_UNIQUENESS * self.topic_uniqueness
            + W_INTERACTION * self.interaction_quality
            + W_DENSITY * self.information_density
            + W_TIME * self.time_relevance
            + W_KEYWORDS * self.keyword_relevance;
        (BASE + weighted).clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
    }
}

/// Deterministic importance heuristic.
#[derive(Clone, Debug)]
pub struct ImportanceScorer {
    common_words: HashSet<String>,
    function_words: HashSet<String>,
    stop_words: HashSet<String>,
    important_keywords: Vec<String>,
}

impl Default for ImportanceScorer {
    fn default() -> Self {
        Self::new(&ScoringLexicon::default())
    }
}

impl ImportanceScorer {
    /// Build a scorer over the given word lists.
    #[must_use]
    pub fn new(lexicon: &ScoringLexicon) -> Self {
        let lower = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|word| word.trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect()
        };
        let common_words: HashSet<String> = lower(&lexicon.common_words).into_iter().collect();
        let function_words: HashSet<String> = lower(&lexicon.function_words).into_iter().collect();
        Self {
            stop_words: common_words.union(&function_words).cloned().collect(),
            common_words,
            function_words,
            important_keywords: lower(&lexicon.important_keywords),
        }
    }

    /// Importance in `[0.1, 1.0]`.
    #[must_use]
    pub fn score(&self, user_text: &str, reply_text: &str, mode: EmotionMode) -> f64 {
        self.breakdown(user_text, reply_text, mode).total()
    }

    /// Every factor of the score.
    #[must_use]
    pub fn breakdown(&self, user_text: &str, reply_text: &str, mode: EmotionMode) -> ImportanceBreakdown {
        let combined = format!("{user_text} {reply_text}");
        let tokens = segment(&combined, &self.stop_words);
        ImportanceBreakdown {
            emotional_intensity: emotional_intensity(mode),
            topic_uniqueness: self.topic_uniqueness(&tokens),
            interaction_quality: interaction_quality(user_text, reply_text),
            information_density: self.information_density(&tokens),
            time_relevance: 1.0,
            keyword_relevance: self.keyword_relevance(&combined.to_lowercase()),
        }
    }

    fn topic_uniqueness(&self, tokens: &[String]) -> f64 {
        let meaningful: Vec<&String> = tokens.iter().filter(|t| char_len(t) > 1).collect();
        if meaningful.is_empty() {
            return 0.2;
        }
        let unique = meaningful
            .iter()
            .filter(|token| !self.common_words.contains(token.as_str()))
            .count();
        let ratio = ratio(unique, meaningful.len());
        if ratio < 0.2 {
            0.2
        } else if ratio < 0.5 {
            0.4 + ratio
        } else {
            0.6f64.mul_add(ratio - 0.5, 0.7)
        }
    }

    fn information_density(&self, tokens: &[String]) -> f64 {
        if tokens.is_empty() {
            return 0.1;
        }
        let content = tokens
            .iter()
            .filter(|token| char_len(token) >= 2 && !self.function_words.contains(token.as_str()))
            .count();
        let ratio = ratio(content, tokens.len());
        if ratio < 0.3 {
            ratio
        } else if ratio < 0.6 {
            0.8f64.mul_add(ratio - 0.3, 0.3)
        } else {
            1.15f64.mul_add(ratio - 0.6, 0.54)
        }
    }

    fn keyword_relevance(&self, lowered: &str) -> f64 {
        let hits = self
            .important_keywords
            .iter()
            .filter(|keyword| lowered.contains(keyword.as_str()))
            .count();
        match hits {
            0 => 0.0,
            1 => 0.3,
            2 | 3 => 0.5,
            many => {
                #[allow(clippy::cast_precision_loss)]
                let many = many as f64;
                0.1f64.mul_add(many, 0.3).min(0.8)
            }
        }
    }
}

/// Mode-driven intensity lookup.
#[must_use]
pub const fn emotional_intensity(mode: EmotionMode) -> f64 {
    match mode {
        EmotionMode::S7 => 0.9,
        EmotionMode::S8 => 0.8,
        EmotionMode::S4 => 0.7,
        EmotionMode::S3 => 0.5,
        EmotionMode::S5 => 0.4,
        EmotionMode::S2 => 0.2,
        EmotionMode::S1 | EmotionMode::S6 | EmotionMode::Idle => 0.3,
    }
}

fn interaction_quality(user_text: &str, reply_text: &str) -> f64 {
    let user_len = char_len(user_text);
    let reply_len = char_len(reply_text);
    let total = user_len + reply_len;

    let mut quality: f64 = 0.2;
    if (50..=500).contains(&total) {
        quality += 0.3;
    } else if (20..=1000).contains(&total) {
        quality += 0.15;
    } else if total < 10 {
        quality -= 0.1;
    }

    if reply_len > 20 && user_len > 5 {
        quality += 0.2;
    } else if reply_len < 5 || user_len < 3 {
        quality -= 0.15;
    }

    let expressive = |text: &str| text.contains(['?', '!', '？', '！']);
    if expressive(user_text) || expressive(reply_text) {
        quality += 0.15;
    }

    quality.clamp(0.0, 1.0)
}

fn ratio(part: usize, whole: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        part as f64 / whole as f64
    }
}
