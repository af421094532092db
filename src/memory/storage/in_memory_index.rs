//! Process-local vector index.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::MemoryId;
use crate::memory::core::record::Metadata;
use crate::memory::storage::vector_index::{
    IndexHit, StoreFuture, StoredDocument, VectorCollection, VectorIndex, check_dims, nearest,
    squared_l2,
};

/// Collections kept in memory for the process lifetime.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: DashMap<String, Arc<InMemoryCollection>>,
}

impl InMemoryVectorIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn open_collection<'a>(
        &'a self,
        name: &'a str,
        ndims: usize,
    ) -> StoreFuture<'a, MemoryResult<Arc<dyn VectorCollection>>> {
        Box::pin(async move {
            let collection = match self.collections.entry(name.to_string()) {
                Entry::Occupied(existing) => Arc::clone(existing.get()),
                Entry::Vacant(slot) => Arc::clone(&slot.insert(Arc::new(InMemoryCollection {
                    name: name.to_string(),
                    ndims,
                    entries: RwLock::new(BTreeMap::new()),
                }))),
            };
            if collection.ndims != ndims {
                return Err(MemoryError::Index(format!(
                    "collection {name} has {} dimensions, requested {ndims}",
                    collection.ndims
                )));
            }
            Ok(collection as Arc<dyn VectorCollection>)
        })
    }
}

struct Slot {
    document: StoredDocument,
    vector: Vec<f64>,
}

/// One in-memory collection.
pub struct InMemoryCollection {
    name: String,
    ndims: usize,
    entries: RwLock<BTreeMap<MemoryId, Slot>>,
}

impl VectorCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn ndims(&self) -> usize {
        self.ndims
    }

    fn upsert(&self, entry: StoredDocument, vector: Vec<f64>) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            check_dims(&self.name, self.ndims, &vector)?;
            self.entries.write().await.insert(
                entry.id,
                Slot {
                    document: entry,
                    vector,
                },
            );
            Ok(())
        })
    }

    fn query<'a>(&'a self, vector: &'a [f64], k: usize) -> StoreFuture<'a, MemoryResult<Vec<IndexHit>>> {
        Box::pin(async move {
            check_dims(&self.name, self.ndims, vector)?;
            let entries = self.entries.read().await;
            let hits = entries
                .values()
                .map(|slot| IndexHit {
                    entry: slot.document.clone(),
                    distance: squared_l2(&slot.vector, vector),
                })
                .collect();
            Ok(nearest(hits, k))
        })
    }

    fn update_metadata(&self, id: MemoryId, partial: Metadata) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            if let Some(slot) = self.entries.write().await.get_mut(&id) {
                slot.document.metadata.extend(partial);
            }
            Ok(())
        })
    }

    fn get_all(&self) -> StoreFuture<'_, MemoryResult<Vec<StoredDocument>>> {
        Box::pin(async move {
            Ok(self
                .entries
                .read()
                .await
                .values()
                .map(|slot| slot.document.clone())
                .collect())
        })
    }

    fn delete(&self, ids: Vec<MemoryId>) -> StoreFuture<'_, MemoryResult<usize>> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            Ok(ids.iter().filter(|id| entries.remove(*id).is_some()).count())
        })
    }

    fn count(&self) -> StoreFuture<'_, MemoryResult<usize>> {
        Box::pin(async move { Ok(self.entries.read().await.len()) })
    }
}
