//! Vector index contract: per-user collections of (vector, document, metadata).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::MemoryId;
use crate::memory::core::record::Metadata;

/// Boxed future type for vector index operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stored entry without its vector.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    /// Entry id.
    pub id: MemoryId,
    /// Document text.
    pub document: String,
    /// Flat metadata.
    pub metadata: Metadata,
}

/// A kNN hit.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexHit {
    /// Stored entry.
    pub entry: StoredDocument,
    /// Squared L2 distance to the query (smaller is closer).
    pub distance: f64,
}

/// An isolated namespace of vectors.
pub trait VectorCollection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;
    /// Dimensionality every vector must have.
    fn ndims(&self) -> usize;
    /// Insert or replace an entry.
    ///
    /// # Errors
    /// Returns an error if the vector has the wrong length or storage fails.
    fn upsert(&self, entry: StoredDocument, vector: Vec<f64>) -> StoreFuture<'_, MemoryResult<()>>;
    /// The `k` nearest entries, nearest first.
    ///
    /// # Errors
    /// Returns an error if the vector has the wrong length or storage fails.
    fn query<'a>(&'a self, vector: &'a [f64], k: usize) -> StoreFuture<'a, MemoryResult<Vec<IndexHit>>>;
    /// Merge `partial` into an entry's metadata; unknown ids are ignored.
    ///
    /// # Errors
    /// Returns an error if storage fails.
    fn update_metadata(&self, id: MemoryId, partial: Metadata) -> StoreFuture<'_, MemoryResult<()>>;
    /// Snapshot of every entry.
    ///
    /// # Errors
    /// Returns an error if storage fails.
    fn get_all(&self) -> StoreFuture<'_, MemoryResult<Vec<StoredDocument>>>;
    /// Delete entries; returns how many existed.
    ///
    /// # Errors
    /// Returns an error if storage fails.
    fn delete(&self, ids: Vec<MemoryId>) -> StoreFuture<'_, MemoryResult<usize>>;
    /// Number of entries.
    ///
    /// # Errors
    /// Returns an error if storage fails.
    fn count(&self) -> StoreFuture<'_, MemoryResult<usize>>;
}

/// Factory for named collections.
pub trait VectorIndex: Send + Sync {
    /// Open or create the collection `name` holding `ndims`-dimensional vectors.
    ///
    /// # Errors
    /// Returns an error if the collection exists with another dimensionality
    /// or storage fails.
    fn open_collection<'a>(
        &'a self,
        name: &'a str,
        ndims: usize,
    ) -> StoreFuture<'a, MemoryResult<Arc<dyn VectorCollection>>>;
}

/// Squared Euclidean distance.
#[must_use]
pub fn squared_l2(left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

/// Reject vectors of the wrong length.
///
/// # Errors
/// Returns `MemoryError::Index` on mismatch.
pub fn check_dims(collection: &str, expected: usize, vector: &[f64]) -> MemoryResult<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(MemoryError::Index(format!(
            "collection {collection} expects {expected} dimensions, got {}",
            vector.len()
        )))
    }
}

/// Sort hits nearest first (ties by id) and keep `k`.
#[must_use]
pub fn nearest(mut hits: Vec<IndexHit>, k: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(distance: f64) -> IndexHit {
        IndexHit {
            entry: StoredDocument {
                id: MemoryId::new(),
                document: String::new(),
                metadata: Metadata::new(),
            },
            distance,
        }
    }

    #[test]
    fn test_squared_l2() {
        assert!((squared_l2(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-12);
        assert!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_orders_and_truncates() {
        let hits = nearest(vec![hit(0.5), hit(0.1), hit(0.3)], 2);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].distance - 0.1).abs() < 1e-12);
        assert!((hits[1].distance - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_check_dims() {
        assert!(check_dims("c", 2, &[1.0, 2.0]).is_ok());
        assert!(matches!(check_dims("c", 3, &[1.0]), Err(MemoryError::Index(_))));
    }
}
