//! Configuration for the memory subsystem.
//!
//! Every knob the scoring, eviction and ranking formulas read lives here, so
//! deployments can tune retention without touching code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::emotion::mode::EmotionMode;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::kinds::{MemoryType, Priority, Sentiment};

const DAY_SECONDS: u64 = 24 * 60 * 60;

/// Top-level configuration for the memory engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Per-type expiry and weight.
    pub types: MemoryTypeTable,
    /// Priority weights used by the relevance score.
    pub priority_weights: PriorityWeights,
    /// Sentiment multipliers used by the relevance score.
    pub sentiment_adjustment: SentimentAdjustment,
    /// Relevance threshold and factor weights.
    pub relevance: RelevanceConfig,
    /// Low-quality cleanup thresholds and default cleanup mode.
    pub cleanup: CleanupPolicy,
    /// Plain retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Composite ranking for smart retrieval.
    pub smart: SmartRetrievalConfig,
    /// Background maintenance scheduling.
    pub maintenance: MaintenanceConfig,
    /// Embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Collection naming and stored document layout.
    pub collection: CollectionConfig,
}

impl MemoryConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MemoryResult<()> {
        for (kind, settings) in &self.types.entries {
            ensure_weight(&format!("types.{kind}.weight"), settings.weight)?;
            if settings.expiry_seconds == Some(0) {
                return Err(MemoryError::InvalidConfig(format!(
                    "types.{kind}.expiry_seconds must be > 0"
                )));
            }
        }
        if self.types.default_expiry_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "types.default_expiry_seconds must be > 0".to_string(),
            ));
        }

        ensure_weight("priority_weights.high", self.priority_weights.high)?;
        ensure_weight("priority_weights.medium", self.priority_weights.medium)?;
        ensure_weight("priority_weights.low", self.priority_weights.low)?;
        ensure_weight("sentiment_adjustment.positive", self.sentiment_adjustment.positive)?;
        ensure_weight("sentiment_adjustment.neutral", self.sentiment_adjustment.neutral)?;
        ensure_weight("sentiment_adjustment.negative", self.sentiment_adjustment.negative)?;

        ensure_weight("relevance.threshold", self.relevance.threshold)?;
        ensure_weight("relevance.importance_weight", self.relevance.importance_weight)?;
        ensure_weight("relevance.access_weight", self.relevance.access_weight)?;
        ensure_weight("relevance.state_weight", self.relevance.state_weight)?;

        if self.retrieval.top_k == 0 {
            return Err(MemoryError::InvalidConfig(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }
        if self.smart.candidate_multiplier == 0 {
            return Err(MemoryError::InvalidConfig(
                "smart.candidate_multiplier must be > 0".to_string(),
            ));
        }
        if self.smart.half_life_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "smart.half_life_seconds must be > 0".to_string(),
            ));
        }
        for (name, weight) in self.smart.weights.named() {
            ensure_weight(&format!("smart.weights.{name}"), weight)?;
        }

        if self.maintenance.max_concurrent_tasks == 0 {
            return Err(MemoryError::InvalidConfig(
                "maintenance.max_concurrent_tasks must be > 0".to_string(),
            ));
        }
        if self.maintenance.max_queued_tasks < self.maintenance.max_concurrent_tasks {
            return Err(MemoryError::InvalidConfig(
                "maintenance.max_queued_tasks must be >= max_concurrent_tasks".to_string(),
            ));
        }
        if self.maintenance.interval_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "maintenance.interval_seconds must be > 0".to_string(),
            ));
        }

        if self.embedding.ndims == 0 {
            return Err(MemoryError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }
        if self.embedding.timeout_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "embedding.timeout_seconds must be > 0".to_string(),
            ));
        }
        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        if self.collection.prefix.trim().is_empty() {
            return Err(MemoryError::InvalidConfig(
                "collection.prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Weight used by the relevance score for a priority.
    #[must_use]
    pub const fn priority_weight(&self, priority: Priority) -> f64 {
        match priority {
            Priority::High => self.priority_weights.high,
            Priority::Medium => self.priority_weights.medium,
            Priority::Low => self.priority_weights.low,
        }
    }

    /// Multiplier used by the relevance score for a sentiment.
    #[must_use]
    pub const fn sentiment_factor(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Positive => self.sentiment_adjustment.positive,
            Sentiment::Neutral => self.sentiment_adjustment.neutral,
            Sentiment::Negative => self.sentiment_adjustment.negative,
        }
    }
}

fn ensure_weight(name: &str, value: f64) -> MemoryResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MemoryError::InvalidConfig(format!(
            "{name} must be a finite, non-negative number (got {value})"
        )))
    }
}

/// Expiry and weight of one memory type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryTypeSettings {
    /// Base expiry in seconds; `None` never expires.
    pub expiry_seconds: Option<u64>,
    /// Multiplier applied to the relevance score.
    pub weight: f64,
}

/// Static per-type table with documented fallbacks for missing entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTypeTable {
    /// Explicit entries.
    pub entries: HashMap<MemoryType, MemoryTypeSettings>,
    /// Expiry used when a type has no entry.
    pub default_expiry_seconds: u64,
    /// Weight used when a type has no entry.
    pub default_weight: f64,
}

impl MemoryTypeTable {
    /// Base expiry for a type in seconds, `None` meaning "never".
    #[must_use]
    pub fn base_expiry_seconds(&self, kind: MemoryType) -> Option<u64> {
        self.entries
            .get(&kind)
            .map_or(Some(self.default_expiry_seconds), |settings| {
                settings.expiry_seconds
            })
    }

    /// Relevance weight for a type.
    #[must_use]
    pub fn weight(&self, kind: MemoryType) -> f64 {
        self.entries
            .get(&kind)
            .map_or(self.default_weight, |settings| settings.weight)
    }
}

impl Default for MemoryTypeTable {
    fn default() -> Self {
        let entries = [
            (MemoryType::SystemSetting, None, 1.5),
            (MemoryType::UserProfile, Some(365 * DAY_SECONDS), 1.2),
            (MemoryType::Fact, Some(180 * DAY_SECONDS), 1.0),
            (MemoryType::Preference, Some(90 * DAY_SECONDS), 1.0),
            (MemoryType::Conversation, Some(30 * DAY_SECONDS), 0.9),
            (MemoryType::Context, Some(7 * DAY_SECONDS), 0.7),
        ]
        .into_iter()
        .map(|(kind, expiry_seconds, weight)| {
            (
                kind,
                MemoryTypeSettings {
                    expiry_seconds,
                    weight,
                },
            )
        })
        .collect();

        Self {
            entries,
            default_expiry_seconds: 30 * DAY_SECONDS,
            default_weight: 1.0,
        }
    }
}

/// Priority weights for the relevance score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    /// Weight for `high`.
    pub high: f64,
    /// Weight for `medium`.
    pub medium: f64,
    /// Weight for `low`.
    pub low: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            high: 0.9,
            medium: 0.5,
            low: 0.2,
        }
    }
}

/// Sentiment multipliers for the relevance score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentAdjustment {
    /// Multiplier for positive records.
    pub positive: f64,
    /// Multiplier for neutral records.
    pub neutral: f64,
    /// Multiplier for negative records.
    pub negative: f64,
}

impl Default for SentimentAdjustment {
    fn default() -> Self {
        Self {
            positive: 1.0,
            neutral: 1.0,
            negative: 0.8,
        }
    }
}

/// Relevance threshold and weights.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Records scoring at or below this value are discarded.
    pub threshold: f64,
    /// Weight of `importance`.
    pub importance_weight: f64,
    /// Weight of the access-frequency factor.
    pub access_weight: f64,
    /// Weight of the mode-match factor.
    pub state_weight: f64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            importance_weight: 0.3,
            access_weight: 0.2,
            state_weight: 0.2,
        }
    }
}

/// Low-quality cleanup rules.
///
/// A record is deleted when it matches either rule:
/// `importance < stale_importance && access < stale_access && age > stale_age`
/// or the same with the `neglected_*` values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Mode passed to relevance cleanup when the caller has none.
    pub default_mode: EmotionMode,
    /// Importance ceiling of the long-age rule.
    pub stale_importance: f64,
    /// Access ceiling (exclusive) of the long-age rule.
    pub stale_access: u32,
    /// Minimum age of the long-age rule.
    pub stale_age_seconds: u64,
    /// Importance ceiling of the short-age rule.
    pub neglected_importance: f64,
    /// Access ceiling (exclusive) of the short-age rule.
    pub neglected_access: u32,
    /// Minimum age of the short-age rule.
    pub neglected_age_seconds: u64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            default_mode: EmotionMode::Idle,
            stale_importance: 0.3,
            stale_access: 2,
            stale_age_seconds: 30 * DAY_SECONDS,
            neglected_importance: 0.2,
            neglected_access: 1,
            neglected_age_seconds: 7 * DAY_SECONDS,
        }
    }
}

/// Retrieval settings for long-term memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of memories to retrieve per query.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Weights of the composite smart-retrieval score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    /// Weight of `1 / (1 + distance)`.
    pub similarity: f64,
    /// Weight of record importance.
    pub importance: f64,
    /// Weight of exponential time decay.
    pub time_decay: f64,
    /// Weight of the access-frequency score.
    pub access: f64,
    /// Weight of the mode-match score.
    pub mode_match: f64,
    /// Weight of keyword Jaccard overlap.
    pub keyword: f64,
}

impl CompositeWeights {
    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("similarity", self.similarity),
            ("importance", self.importance),
            ("time_decay", self.time_decay),
            ("access", self.access),
            ("mode_match", self.mode_match),
            ("keyword", self.keyword),
        ]
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            similarity: 0.4,
            importance: 0.2,
            time_decay: 0.15,
            access: 0.10,
            mode_match: 0.10,
            keyword: 0.05,
        }
    }
}

/// Smart retrieval settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartRetrievalConfig {
    /// Composite score weights.
    pub weights: CompositeWeights,
    /// Candidates fetched per requested result.
    pub candidate_multiplier: usize,
    /// Decay constant for `exp(-age / half_life)`.
    pub half_life_seconds: u64,
    /// Mode pairs treated as compatible (symmetric).
    pub compatible_modes: Vec<[EmotionMode; 2]>,
    /// Mode-match score for identical modes.
    pub exact_mode_score: f64,
    /// Mode-match score for compatible modes.
    pub compatible_mode_score: f64,
    /// Mode-match score otherwise.
    pub other_mode_score: f64,
}

impl SmartRetrievalConfig {
    /// Mode-match score between a record's mode and the current one.
    #[must_use]
    pub fn mode_match(&self, record: EmotionMode, current: EmotionMode) -> f64 {
        if record == current {
            return self.exact_mode_score;
        }
        let compatible = self.compatible_modes.iter().any(|[a, b]| {
            (*a == record && *b == current) || (*a == current && *b == record)
        });
        if compatible {
            self.compatible_mode_score
        } else {
            self.other_mode_score
        }
    }
}

impl Default for SmartRetrievalConfig {
    fn default() -> Self {
        Self {
            weights: CompositeWeights::default(),
            candidate_multiplier: 2,
            half_life_seconds: 7 * DAY_SECONDS,
            compatible_modes: vec![
                [EmotionMode::S1, EmotionMode::S3],
                [EmotionMode::S1, EmotionMode::S5],
                [EmotionMode::S2, EmotionMode::S5],
            ],
            exact_mode_score: 1.0,
            compatible_mode_score: 0.7,
            other_mode_score: 0.3,
        }
    }
}

/// Background maintenance settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Delay before a scheduled pass runs, so it does not contend with the reply.
    pub delay_ms: u64,
    /// Interval of the periodic sweep.
    pub interval_seconds: u64,
    /// Whether the periodic sweep runs at all.
    pub periodic_enabled: bool,
    /// Whether the periodic sweep also runs the relevance pass for
    /// `cleanup.default_mode`.
    pub relevance_sweep: bool,
    /// Worker pool size for background tasks.
    pub max_concurrent_tasks: usize,
    /// Background tasks admitted at once, running or waiting; extra tasks
    /// are dropped.
    pub max_queued_tasks: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2_000,
            interval_seconds: 3_600,
            periodic_enabled: true,
            relevance_sweep: false,
            max_concurrent_tasks: 2,
            max_queued_tasks: 64,
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model name; `None` selects the hashing fallback.
    pub model: Option<String>,
    /// Model embedding dimensions; the hashing fallback is fixed at 256.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Number of recent texts whose vectors are cached.
    pub cache_capacity: usize,
    /// Upper bound on a single embedding call.
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            ndims: 256,
            base_url: None,
            cache_capacity: 256,
            timeout_seconds: 30,
        }
    }
}

/// Collection naming and stored document layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Prefix of per-user collection names.
    pub prefix: String,
    /// Label of the user line in stored documents.
    pub user_label: String,
    /// Label of the reply line in stored documents.
    pub assistant_label: String,
    /// Label of the mode line in stored documents.
    pub state_label: String,
    /// Keywords turned into tags when found in the user text.
    pub user_tag_keywords: Vec<String>,
    /// Keywords turned into tags when found in the reply text.
    pub assistant_tag_keywords: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            prefix: "memory".to_string(),
            user_label: "用户".to_string(),
            assistant_label: "智子".to_string(),
            state_label: "状态".to_string(),
            user_tag_keywords: words(&[
                "时间", "睡觉", "购买", "限定", "哥哥", "妹妹", "晚安", "早上", "晚上",
            ]),
            assistant_tag_keywords: words(&["蜂黄泉", "限定", "购买", "一起", "玩"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_type_table_fallbacks() {
        let mut table = MemoryTypeTable::default();
        assert_eq!(table.base_expiry_seconds(MemoryType::SystemSetting), None);
        assert_eq!(
            table.base_expiry_seconds(MemoryType::Context),
            Some(7 * DAY_SECONDS)
        );

        table.entries.remove(&MemoryType::Fact);
        assert!((table.weight(MemoryType::Fact) - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            table.base_expiry_seconds(MemoryType::Fact),
            Some(30 * DAY_SECONDS)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MemoryConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.relevance.threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.embedding.base_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.maintenance.max_queued_tasks = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_match_is_symmetric() {
        let smart = SmartRetrievalConfig::default();
        assert!((smart.mode_match(EmotionMode::S3, EmotionMode::S1) - 0.7).abs() < 1e-12);
        assert!((smart.mode_match(EmotionMode::S1, EmotionMode::S3) - 0.7).abs() < 1e-12);
        assert!((smart.mode_match(EmotionMode::S2, EmotionMode::S2) - 1.0).abs() < 1e-12);
        assert!((smart.mode_match(EmotionMode::S2, EmotionMode::S7) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"retrieval": {"top_k": 5}}"#).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.relevance.threshold - 0.5).abs() < f64::EPSILON);
    }
}
