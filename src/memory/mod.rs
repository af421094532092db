//! Adaptive memory engine.
//!
//! Per-user collections of conversational memories, organized into:
//! - `core`: configuration, errors, identifiers, labels and the record type
//! - `embedding`: embedding model abstraction, Ollama client and hashing fallback
//! - `storage`: vector index backends (in-memory and `SQLite`)
//! - `scoring`: importance heuristic and retention rules
//! - `retrieval`: plain and composite ranking
//! - `engine`: the per-user store and its registry
//! - `maintenance`: bounded background tasks and the periodic sweep

pub mod core;
pub mod embedding;
pub mod engine;
pub mod maintenance;
pub mod retrieval;
pub mod scoring;
pub mod storage;

pub use core::{
    MemoryConfig, MemoryError, MemoryId, MemoryRecord, MemoryResult, MemoryType, NewMemory,
    Priority, Sentiment, UserId,
};
pub use embedding::{Embedder, HashingEmbedder, OllamaEmbedder, embedder_from_config};
pub use engine::{MemoryServices, MemoryStore, MemoryStoreRegistry};
pub use maintenance::{BackgroundCleanup, BackgroundTasks};
pub use retrieval::{RetrievedMemory, ScoredMemory};
pub use scoring::{ImportanceScorer, RelevanceEvaluator};
pub use storage::{InMemoryVectorIndex, SqliteVectorIndex, VectorCollection, VectorIndex};
