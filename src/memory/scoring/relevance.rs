//! Retention decisions: dynamic expiry, relevance score and low-quality rules.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::emotion::mode::EmotionMode;
use crate::memory::core::config::MemoryConfig;
use crate::memory::core::record::MemoryRecord;

/// Weight of the priority term in the relevance base score.
const PRIORITY_TERM_WEIGHT: f64 = 0.3;
const ACCESS_SATURATION: f64 = 20.0;

/// Decides whether stored records should be kept.
#[derive(Clone, Debug)]
pub struct RelevanceEvaluator {
    config: Arc<MemoryConfig>,
}

impl RelevanceEvaluator {
    /// Create an evaluator bound to a configuration.
    #[must_use]
    pub const fn new(config: Arc<MemoryConfig>) -> Self {
        Self { config }
    }

    /// Dynamic expiry in seconds, `None` when the type never expires.
    ///
    /// `base × priority × (0.5 + 1.5·importance) × (0.5 + min(access/10, 1.5))
    /// × max(0.5, 2 − idle / (base / 2))`
    #[must_use]
    pub fn dynamic_expiry_seconds(&self, record: &MemoryRecord, now: DateTime<Utc>) -> Option<f64> {
        let base = self.config.types.base_expiry_seconds(record.memory_type)?;
        #[allow(clippy::cast_precision_loss)]
        let base = base as f64;

        let importance = 1.5f64.mul_add(record.importance, 0.5);
        let access = 0.5 + (f64::from(record.access_count) / 10.0).min(1.5);
        let recency = (2.0 - record.idle_seconds(now) / (base / 2.0)).max(0.5);

        Some(base * record.priority.expiry_multiplier() * importance * access * recency)
    }

    /// True when the record outlived its dynamic expiry.
    #[must_use]
    pub fn is_expired(&self, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        self.dynamic_expiry_seconds(record, now)
            .is_some_and(|expiry| record.age_seconds(now) > expiry)
    }

    /// Relevance score of a record for the current mode.
    #[must_use]
    pub fn relevance_score(&self, record: &MemoryRecord, mode: EmotionMode) -> f64 {
        let weights = &self.config.relevance;
        let priority = self.config.priority_weight(record.priority);
        let access = (f64::from(record.access_count) / ACCESS_SATURATION).min(1.0);
        let state = if record.mode == mode { 1.0 } else { 0.5 };

        let base = priority * PRIORITY_TERM_WEIGHT
            + record.importance * weights.importance_weight
            + access * weights.access_weight
            + state * weights.state_weight;

        base * self.config.sentiment_factor(record.sentiment)
            * self.config.types.weight(record.memory_type)
    }

    /// Keep a record only if it is unexpired and scores above the threshold.
    #[must_use]
    pub fn check_relevance(&self, record: &MemoryRecord, mode: EmotionMode, now: DateTime<Utc>) -> bool {
        !self.is_expired(record, now)
            && self.relevance_score(record, mode) > self.config.relevance.threshold
    }

    /// Low-quality rule used by the background pass.
    #[must_use]
    pub fn is_low_quality(&self, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        let policy = &self.config.cleanup;
        let age = record.age_seconds(now);
        #[allow(clippy::cast_precision_loss)]
        let (stale_age, neglected_age) = (
            policy.stale_age_seconds as f64,
            policy.neglected_age_seconds as f64,
        );

        let stale = record.importance < policy.stale_importance
            && record.access_count < policy.stale_access
            && age > stale_age;
        let neglected = record.importance < policy.neglected_importance
            && record.access_count < policy.neglected_access
            && age > neglected_age;
        stale || neglected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::kinds::{MemoryType, Priority, Sentiment};
    use crate::memory::core::record::sample_record;

    fn evaluator() -> RelevanceEvaluator {
        RelevanceEvaluator::new(Arc::new(MemoryConfig::default()))
    }

    #[test]
    fn test_low_priority_old_conversation_is_expired() {
        let now = Utc::now();
        let mut record = sample_record(0.1, 0, 40, now);
        record.priority = Priority::Low;
        assert!(evaluator().is_expired(&record, now));
    }

    #[test]
    fn test_fresh_record_is_not_expired() {
        let now = Utc::now();
        let record = sample_record(0.5, 0, 1, now);
        assert!(!evaluator().is_expired(&record, now));
    }

    #[test]
    fn test_system_setting_never_expires() {
        let now = Utc::now();
        let mut record = sample_record(0.0, 0, 10_000, now);
        record.memory_type = MemoryType::SystemSetting;
        record.priority = Priority::Low;
        let evaluator = evaluator();
        assert_eq!(evaluator.dynamic_expiry_seconds(&record, now), None);
        assert!(!evaluator.is_expired(&record, now));
    }

    #[test]
    fn test_expiry_monotonic_in_access_and_importance() {
        let now = Utc::now();
        let evaluator = evaluator();
        let mut previous = 0.0;
        for access in 0..30 {
            let record = sample_record(0.4, access, 5, now);
            let expiry = evaluator.dynamic_expiry_seconds(&record, now).unwrap();
            assert!(expiry >= previous);
            previous = expiry;
        }

        let mut previous = 0.0;
        for step in 0..=10 {
            let record = sample_record(f64::from(step) / 10.0, 2, 5, now);
            let expiry = evaluator.dynamic_expiry_seconds(&record, now).unwrap();
            assert!(expiry >= previous);
            previous = expiry;
        }
    }

    #[test]
    fn test_relevance_score_formula() {
        let now = Utc::now();
        let mut record = sample_record(0.8, 10, 1, now);
        record.priority = Priority::High;
        record.sentiment = Sentiment::Negative;
        record.memory_type = MemoryType::Fact;

        // (0.9*0.3 + 0.8*0.3 + 0.5*0.2 + 1.0*0.2) * 0.8 * 1.0
        let expected = (0.27 + 0.24 + 0.1 + 0.2) * 0.8;
        let score = evaluator().relevance_score(&record, EmotionMode::S1);
        assert!((score - expected).abs() < 1e-9);

        // mismatched mode halves the state term
        let other = evaluator().relevance_score(&record, EmotionMode::S4);
        assert!((score - other - 0.1 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_check_relevance_never_keeps_expired() {
        let now = Utc::now();
        let evaluator = evaluator();
        for age in [0, 10, 40, 100, 400, 2_000] {
            for importance in [0.0, 0.5, 1.0] {
                for access in [0, 5, 50] {
                    let mut record = sample_record(importance, access, age, now);
                    record.priority = Priority::High;
                    if evaluator.is_expired(&record, now) {
                        assert!(!evaluator.check_relevance(&record, record.mode, now));
                    }
                }
            }
        }
    }

    #[test]
    fn test_low_quality_rules() {
        let now = Utc::now();
        let evaluator = evaluator();
        assert!(evaluator.is_low_quality(&sample_record(0.25, 1, 31, now), now));
        assert!(!evaluator.is_low_quality(&sample_record(0.25, 2, 31, now), now));
        assert!(evaluator.is_low_quality(&sample_record(0.1, 0, 8, now), now));
        assert!(!evaluator.is_low_quality(&sample_record(0.1, 1, 8, now), now));
        assert!(!evaluator.is_low_quality(&sample_record(0.1, 0, 6, now), now));
    }
}
