//! Ordering of retrieved memories.
//!
//! Plain retrieval keeps the index order and breaks distance ties by priority
//! and importance. Smart retrieval blends distance with record quality,
//! recency, access frequency, mode match and keyword overlap.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::emotion::mode::EmotionMode;
use crate::memory::core::config::SmartRetrievalConfig;
use crate::memory::core::record::MemoryRecord;
use crate::memory::scoring::lexicon::jaccard;

const ACCESS_SATURATION: f64 = 10.0;

/// A record returned by plain retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedMemory {
    /// Squared L2 distance to the query.
    pub distance: f64,
    /// Record with access statistics already bumped.
    pub record: MemoryRecord,
}

/// Components of a composite score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CompositeParts {
    /// `1 / (1 + distance)`.
    pub similarity: f64,
    /// Record importance.
    pub importance: f64,
    /// `exp(-age / half_life)`.
    pub time_decay: f64,
    /// `min(access / 10, 1)`.
    pub access: f64,
    /// Mode compatibility.
    pub mode_match: f64,
    /// Token Jaccard overlap between record and query.
    pub keyword: f64,
}

/// A record returned by smart retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMemory {
    /// Weighted sum of `parts`.
    pub score: f64,
    /// Squared L2 distance to the query.
    pub distance: f64,
    /// Score breakdown.
    pub parts: CompositeParts,
    /// Record with access statistics already bumped.
    pub record: MemoryRecord,
}

/// Sort by distance ascending, then priority descending, then importance descending.
pub fn sort_retrieved(memories: &mut [RetrievedMemory]) {
    memories.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| b.record.priority.rank().cmp(&a.record.priority.rank()))
            .then_with(|| b.record.importance.total_cmp(&a.record.importance))
    });
}

/// Score one candidate.
#[must_use]
pub fn composite_parts(
    record: &MemoryRecord,
    distance: f64,
    query: &str,
    mode: EmotionMode,
    config: &SmartRetrievalConfig,
    now: DateTime<Utc>,
) -> CompositeParts {
    #[allow(clippy::cast_precision_loss)]
    let half_life = config.half_life_seconds as f64;
    CompositeParts {
        similarity: 1.0 / (1.0 + distance.max(0.0)),
        importance: record.importance,
        time_decay: (-record.age_seconds(now) / half_life).exp(),
        access: (f64::from(record.access_count) / ACCESS_SATURATION).min(1.0),
        mode_match: config.mode_match(record.mode, mode),
        keyword: jaccard(&record.content, query),
    }
}

/// Weighted sum of the parts.
#[must_use]
pub fn composite_score(parts: &CompositeParts, config: &SmartRetrievalConfig) -> f64 {
    let w = &config.weights;
    w.similarity * parts.similarity
        + w.importance * parts.importance
        + w.time_decay * parts.time_decay
        + w.access * parts.access
        + w.mode_match * parts.mode_match
        + w.keyword * parts.keyword
}

/// Score every candidate, sort by score descending and keep `k`.
#[must_use]
pub fn rank_composite(
    candidates: Vec<RetrievedMemory>,
    query: &str,
    mode: EmotionMode,
    config: &SmartRetrievalConfig,
    k: usize,
    now: DateTime<Utc>,
) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .map(|candidate| {
            let parts = composite_parts(&candidate.record, candidate.distance, query, mode, config, now);
            ScoredMemory {
                score: composite_score(&parts, config),
                distance: candidate.distance,
                parts,
                record: candidate.record,
            }
        })
        .collect();
    scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.distance.total_cmp(&b.distance),
        other => other,
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::kinds::Priority;
    use crate::memory::core::record::sample_record;

    fn retrieved(distance: f64, priority: Priority, importance: f64) -> RetrievedMemory {
        let mut record = sample_record(importance, 0, 1, Utc::now());
        record.priority = priority;
        RetrievedMemory { distance, record }
    }

    #[test]
    fn test_sort_retrieved_tie_breaks() {
        let mut memories = vec![
            retrieved(0.5, Priority::High, 0.9),
            retrieved(0.2, Priority::Low, 0.1),
            retrieved(0.2, Priority::High, 0.3),
            retrieved(0.2, Priority::High, 0.7),
        ];
        sort_retrieved(&mut memories);
        let order: Vec<(f64, Priority, f64)> = memories
            .iter()
            .map(|m| (m.distance, m.record.priority, m.record.importance))
            .collect();
        assert_eq!(
            order,
            vec![
                (0.2, Priority::High, 0.7),
                (0.2, Priority::High, 0.3),
                (0.2, Priority::Low, 0.1),
                (0.5, Priority::High, 0.9),
            ]
        );
    }

    #[test]
    fn test_composite_parts_for_fresh_exact_match() {
        let now = Utc::now();
        let mut record = sample_record(0.6, 20, 0, now);
        record.content = "hello world".to_string();
        let config = SmartRetrievalConfig::default();
        let parts = composite_parts(&record, 0.0, "hello world", EmotionMode::S1, &config, now);
        assert!((parts.similarity - 1.0).abs() < 1e-12);
        assert!((parts.time_decay - 1.0).abs() < 1e-9);
        assert!((parts.access - 1.0).abs() < 1e-12);
        assert!((parts.mode_match - 1.0).abs() < 1e-12);
        assert!((parts.keyword - 1.0).abs() < 1e-12);
        let score = composite_score(&parts, &config);
        let expected = 0.4 + 0.2 * 0.6 + 0.15 + 0.10 + 0.10 + 0.05;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_decay_uses_half_life() {
        let now = Utc::now();
        let record = sample_record(0.5, 0, 7, now);
        let config = SmartRetrievalConfig::default();
        let parts = composite_parts(&record, 1.0, "", EmotionMode::S5, &config, now);
        assert!((parts.time_decay - (-1.0f64).exp()).abs() < 1e-6);
        assert!((parts.similarity - 0.5).abs() < 1e-12);
        assert!((parts.mode_match - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_rank_composite_sorted_descending() {
        let now = Utc::now();
        let candidates = vec![
            retrieved(2.0, Priority::Low, 0.1),
            retrieved(0.0, Priority::High, 0.9),
            retrieved(0.7, Priority::Medium, 0.5),
            retrieved(0.3, Priority::Medium, 0.2),
        ];
        let config = SmartRetrievalConfig::default();
        let ranked = rank_composite(candidates, "hi", EmotionMode::S1, &config, 3, now);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(ranked[0].distance.abs() < 1e-12);
    }
}
