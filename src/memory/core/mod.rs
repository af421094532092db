//! Core memory types: configuration, errors, identifiers, labels and records.

pub mod config;
pub mod errors;
pub mod ids;
pub mod kinds;
pub mod record;

pub use config::{
    CleanupPolicy, CollectionConfig, CompositeWeights, EmbeddingConfig, MaintenanceConfig,
    MemoryConfig, MemoryTypeSettings, MemoryTypeTable, PriorityWeights, RelevanceConfig,
    RetrievalConfig, SentimentAdjustment, SmartRetrievalConfig,
};
pub use errors::{MemoryError, MemoryResult};
pub use ids::{MemoryId, UserId, UserIdError};
pub use kinds::{MemoryType, Priority, Sentiment};
pub use record::{MemoryRecord, Metadata, NewMemory, render_document};
