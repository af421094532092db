//! Vector index backends for memory records.

pub mod in_memory_index;
pub mod sqlite_index;
pub mod vector_index;

pub use in_memory_index::{InMemoryCollection, InMemoryVectorIndex};
pub use sqlite_index::{SqliteCollection, SqliteVectorIndex};
pub use vector_index::{
    IndexHit, StoreFuture, StoredDocument, VectorCollection, VectorIndex, squared_l2,
};
