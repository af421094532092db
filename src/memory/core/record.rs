//! Stored memory record and its flat metadata encoding.
//!
//! The vector index only keeps a document string and a flat JSON map per
//! entry. Encoding is lossless for well-formed records; decoding never fails
//! and substitutes documented defaults for anything malformed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::emotion::mode::EmotionMode;
use crate::memory::core::config::CollectionConfig;
use crate::memory::core::errors::MemoryResult;
use crate::memory::core::ids::MemoryId;
use crate::memory::core::kinds::{MemoryType, Priority, Sentiment};

/// Flat metadata map stored next to each vector.
pub type Metadata = Map<String, Value>;

/// Importance used when a stored value is missing or not a number.
pub const FALLBACK_IMPORTANCE: f64 = 0.5;
/// Category used when the caller does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Metadata keys.
pub mod keys {
    /// Creation time (RFC 3339).
    pub const TIMESTAMP: &str = "timestamp";
    /// Last retrieval time (RFC 3339).
    pub const LAST_ACCESSED: &str = "last_accessed";
    /// User side of the turn.
    pub const USER_MSG: &str = "user_msg";
    /// Reply side of the turn.
    pub const ASSISTANT_MSG: &str = "assistant_msg";
    /// Emotion mode at creation.
    pub const STATE: &str = "state";
    /// Memory type label.
    pub const MEMORY_TYPE: &str = "memory_type";
    /// Free-form category.
    pub const CATEGORY: &str = "category";
    /// Comma-joined tags.
    pub const TAGS: &str = "tags";
    /// Sentiment label.
    pub const SENTIMENT: &str = "sentiment";
    /// Priority label.
    pub const PRIORITY: &str = "priority";
    /// Importance in `[0, 1]`.
    pub const IMPORTANCE: &str = "importance";
    /// Retrieval count.
    pub const ACCESS_COUNT: &str = "access_count";
}

/// A single stored memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique, time-ordered identifier.
    pub id: MemoryId,
    /// Rendered document that was embedded.
    pub content: String,
    /// User side of the turn.
    pub user_text: String,
    /// Reply side of the turn.
    pub reply_text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time a query returned this record; never before `created_at`.
    pub last_accessed_at: DateTime<Utc>,
    /// Emotion mode when the record was created.
    pub mode: EmotionMode,
    /// Semantic type.
    pub memory_type: MemoryType,
    /// Free-form category.
    pub category: String,
    /// Ordered, duplicate-free tags.
    pub tags: Vec<String>,
    /// Sentiment label.
    pub sentiment: Sentiment,
    /// Retention priority.
    pub priority: Priority,
    /// Importance in `[0, 1]`.
    pub importance: f64,
    /// Number of times a query returned this record.
    pub access_count: u32,
}

impl MemoryRecord {
    /// Clamp importance and order timestamps.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.importance = clamp_importance(self.importance);
        if self.last_accessed_at < self.created_at {
            self.last_accessed_at = self.created_at;
        }
        self.tags = dedup_tags(self.tags);
        self
    }

    /// Count a retrieval at `now`.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now.max(self.created_at);
    }

    /// Seconds since creation, never negative.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.created_at, now)
    }

    /// Seconds since last access, never negative.
    #[must_use]
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.last_accessed_at, now)
    }

    /// Full metadata map.
    #[must_use]
    pub fn to_metadata(&self) -> Metadata {
        let mut map = self.access_metadata();
        map.insert(keys::TIMESTAMP.into(), Value::String(self.created_at.to_rfc3339()));
        map.insert(keys::USER_MSG.into(), Value::String(self.user_text.clone()));
        map.insert(keys::ASSISTANT_MSG.into(), Value::String(self.reply_text.clone()));
        map.insert(keys::STATE.into(), Value::String(self.mode.as_str().into()));
        map.insert(keys::MEMORY_TYPE.into(), Value::String(self.memory_type.as_str().into()));
        map.insert(keys::CATEGORY.into(), Value::String(self.category.clone()));
        map.insert(keys::TAGS.into(), Value::String(self.tags.join(",")));
        map.insert(keys::SENTIMENT.into(), Value::String(self.sentiment.as_str().into()));
        map.insert(keys::PRIORITY.into(), Value::String(self.priority.as_str().into()));
        map.insert(keys::IMPORTANCE.into(), Value::from(self.importance));
        map
    }

    /// Partial metadata carrying only the access statistics.
    #[must_use]
    pub fn access_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert(keys::ACCESS_COUNT.into(), Value::from(self.access_count));
        map.insert(
            keys::LAST_ACCESSED.into(),
            Value::String(self.last_accessed_at.to_rfc3339()),
        );
        map
    }

    /// Rebuild a record from what the index returned.
    ///
    /// Unparsable timestamps become `now`, unknown labels fall back to their
    /// defaults (`conversation`, `neutral`, `medium`, `idle`), importance is
    /// clamped or replaced by `0.5`, and bad access counts become `0`.
    #[must_use]
    pub fn from_stored(
        id: MemoryId,
        document: &str,
        metadata: &Metadata,
        now: DateTime<Utc>,
    ) -> Self {
        let text = |key: &str| metadata.get(key).and_then(Value::as_str).unwrap_or_default();
        let created_at = decode_time(metadata.get(keys::TIMESTAMP), now);
        let last_accessed_at = decode_time(metadata.get(keys::LAST_ACCESSED), created_at);

        Self {
            id,
            content: document.to_string(),
            user_text: text(keys::USER_MSG).to_string(),
            reply_text: text(keys::ASSISTANT_MSG).to_string(),
            created_at,
            last_accessed_at,
            mode: EmotionMode::parse_lenient(text(keys::STATE)),
            memory_type: text(keys::MEMORY_TYPE).parse().unwrap_or_default(),
            category: match text(keys::CATEGORY) {
                "" => DEFAULT_CATEGORY.to_string(),
                category => category.to_string(),
            },
            tags: decode_tags(metadata.get(keys::TAGS)),
            sentiment: Sentiment::parse_lenient(text(keys::SENTIMENT)),
            priority: text(keys::PRIORITY).parse().unwrap_or_default(),
            importance: decode_importance(metadata.get(keys::IMPORTANCE)),
            access_count: decode_count(metadata.get(keys::ACCESS_COUNT)),
        }
        .normalized()
    }
}

/// Caller-supplied fields of a memory about to be added.
///
/// `importance` and `tags` left as `None` are derived by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMemory {
    /// User side of the turn.
    pub user_text: String,
    /// Reply side of the turn.
    pub reply_text: String,
    /// Emotion mode at creation.
    pub mode: EmotionMode,
    /// Semantic type.
    pub memory_type: MemoryType,
    /// Free-form category.
    pub category: String,
    /// Explicit tags.
    pub tags: Option<Vec<String>>,
    /// Sentiment label.
    pub sentiment: Sentiment,
    /// Retention priority.
    pub priority: Priority,
    /// Explicit importance.
    pub importance: Option<f64>,
}

impl NewMemory {
    /// A conversational turn with default classification.
    #[must_use]
    pub fn conversation(
        user_text: impl Into<String>,
        reply_text: impl Into<String>,
        mode: EmotionMode,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            reply_text: reply_text.into(),
            mode,
            memory_type: MemoryType::Conversation,
            category: DEFAULT_CATEGORY.to_string(),
            tags: None,
            sentiment: Sentiment::Neutral,
            priority: Priority::Medium,
            importance: None,
        }
    }

    /// Set the memory type.
    #[must_use]
    pub const fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set explicit tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set the sentiment.
    #[must_use]
    pub const fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the priority from an untrusted label.
    ///
    /// # Errors
    /// Returns `MemoryError::InvalidPriority` for labels other than
    /// `high`, `medium` or `low`.
    pub fn with_priority_label(self, label: &str) -> MemoryResult<Self> {
        Ok(self.with_priority(label.parse()?))
    }

    /// Set an explicit importance (clamped into `[0, 1]` on insert).
    #[must_use]
    pub const fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }
}

/// Render the document that gets embedded for a turn.
#[must_use]
pub fn render_document(
    labels: &CollectionConfig,
    user_text: &str,
    reply_text: &str,
    mode: EmotionMode,
) -> String {
    format!(
        "{}: {user_text}\n{}: {reply_text}\n{}: {mode}",
        labels.user_label, labels.assistant_label, labels.state_label
    )
}

/// Remove duplicate and blank tags, keeping first occurrences in order.
#[must_use]
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

/// Clamp into `[0, 1]`, replacing non-finite values with the fallback.
#[must_use]
pub fn clamp_importance(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        FALLBACK_IMPORTANCE
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    #[allow(clippy::cast_precision_loss)]
    {
        millis as f64 / 1_000.0
    }
}

fn decode_time(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map_or(fallback, |time| time.with_timezone(&Utc))
}

fn decode_importance(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.map_or(FALLBACK_IMPORTANCE, clamp_importance)
}

fn decode_count(value: Option<&Value>) -> u32 {
    let count = match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| n.is_finite() && *n >= 0.0).map(float_to_u64)),
        Some(Value::String(raw)) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };
    count.map_or(0, |count| u32::try_from(count).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_u64(value: f64) -> u64 {
    value.floor() as u64
}

fn decode_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(joined)) => dedup_tags(joined.split(',').map(str::to_string).collect()),
        Some(Value::Array(items)) => dedup_tags(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        _ => Vec::new(),
    }
}

/// Build a record with explicit timestamps, for tests across the crate.
#[cfg(test)]
pub(crate) fn sample_record(
    importance: f64,
    access_count: u32,
    age_days: i64,
    now: DateTime<Utc>,
) -> MemoryRecord {
    let created_at = now - chrono::Duration::days(age_days);
    MemoryRecord {
        id: MemoryId::new(),
        content: "用户: hi\n智子: hello\n状态: S1".to_string(),
        user_text: "hi".to_string(),
        reply_text: "hello".to_string(),
        created_at,
        last_accessed_at: created_at,
        mode: EmotionMode::S1,
        memory_type: MemoryType::Conversation,
        category: DEFAULT_CATEGORY.to_string(),
        tags: vec!["state_S1".to_string()],
        sentiment: Sentiment::Neutral,
        priority: Priority::Medium,
        importance,
        access_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_roundtrip_preserves_fields() {
        let now = Utc::now();
        let mut record = sample_record(0.42, 3, 2, now);
        record.tags = vec!["state_S1".into(), "晚安".into()];
        record.priority = Priority::High;
        record.memory_type = MemoryType::Fact;

        let decoded = MemoryRecord::from_stored(record.id, &record.content, &record.to_metadata(), now);
        assert_eq!(decoded.tags, record.tags);
        assert_eq!(decoded.priority, Priority::High);
        assert_eq!(decoded.memory_type, MemoryType::Fact);
        assert_eq!(decoded.access_count, 3);
        assert!((decoded.importance - 0.42).abs() < 1e-12);
        assert_eq!(decoded.created_at.timestamp(), record.created_at.timestamp());
    }

    #[test]
    fn test_defensive_decoding() {
        let now = Utc::now();
        let metadata: Metadata = json!({
            "timestamp": "yesterday-ish",
            "last_accessed": 17,
            "state": "S42",
            "memory_type": "dream",
            "sentiment": "ecstatic",
            "priority": "urgent",
            "importance": 7.5,
            "access_count": -4,
            "tags": "a,,b,a",
        })
        .as_object()
        .cloned()
        .unwrap();

        let record = MemoryRecord::from_stored(MemoryId::new(), "doc", &metadata, now);
        assert_eq!(record.created_at, now);
        assert_eq!(record.last_accessed_at, now);
        assert_eq!(record.mode, EmotionMode::Idle);
        assert_eq!(record.memory_type, MemoryType::Conversation);
        assert_eq!(record.sentiment, Sentiment::Neutral);
        assert_eq!(record.priority, Priority::Medium);
        assert!((record.importance - 1.0).abs() < f64::EPSILON);
        assert_eq!(record.access_count, 0);
        assert_eq!(record.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(record.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_non_numeric_importance_falls_back() {
        let metadata: Metadata = json!({"importance": "lots", "access_count": "12"})
            .as_object()
            .cloned()
            .unwrap();
        let record = MemoryRecord::from_stored(MemoryId::new(), "", &metadata, Utc::now());
        assert!((record.importance - FALLBACK_IMPORTANCE).abs() < f64::EPSILON);
        assert_eq!(record.access_count, 12);
    }

    #[test]
    fn test_record_access_keeps_timestamp_order() {
        let now = Utc::now();
        let mut record = sample_record(0.5, 0, 1, now);
        record.record_access(now - chrono::Duration::days(10));
        assert_eq!(record.access_count, 1);
        assert_eq!(record.last_accessed_at, record.created_at);
        record.record_access(now);
        assert_eq!(record.access_count, 2);
        assert_eq!(record.last_accessed_at, now);
    }

    #[test]
    fn test_unknown_priority_label_is_rejected() {
        let draft = NewMemory::conversation("u", "r", EmotionMode::S1);
        assert!(draft.clone().with_priority_label("low").is_ok());
        assert!(draft.with_priority_label("critical").is_err());
    }

    #[test]
    fn test_render_document_layout() {
        let doc = render_document(&CollectionConfig::default(), "为什么", "因为", EmotionMode::S2);
        assert_eq!(doc, "用户: 为什么\n智子: 因为\n状态: S2");
    }
}
