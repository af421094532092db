//! Per-user memory stores and their registry.

pub mod registry;
pub mod store;

pub use registry::{MemoryStoreRegistry, collection_name};
pub use store::{CleanupReport, MemoryServices, MemoryStore, auto_tags};
