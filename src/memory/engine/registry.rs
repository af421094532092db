//! Lazily opened per-user stores.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::memory::core::ids::UserId;
use crate::memory::engine::store::{MemoryServices, MemoryStore};
use crate::memory::storage::vector_index::VectorIndex;

/// Collection name for a user: `{prefix}_{key}__d{ndims}`, where `key` is
/// [`UserId::collection_key`].
///
/// The dimension suffix keeps collections built by different embedding
/// models apart.
#[must_use]
pub fn collection_name(prefix: &str, user: &UserId, ndims: usize) -> String {
    format!("{prefix}_{}__d{ndims}", user.collection_key())
}

/// Hands out one [`MemoryStore`] per user.
pub struct MemoryStoreRegistry {
    index: Arc<dyn VectorIndex>,
    services: MemoryServices,
    stores: DashMap<UserId, Arc<MemoryStore>>,
    open_lock: Mutex<()>,
}

impl MemoryStoreRegistry {
    /// Registry over `index`.
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, services: MemoryServices) -> Self {
        Self {
            index,
            services,
            stores: DashMap::new(),
            open_lock: Mutex::new(()),
        }
    }

    /// Shared collaborators.
    #[must_use]
    pub const fn services(&self) -> &MemoryServices {
        &self.services
    }

    /// Store for `user`, opening its collection on first use.
    ///
    /// If the collection cannot be opened the caller gets an unconfigured
    /// store, which is not cached so the next call retries.
    pub async fn store_for(&self, user: &UserId) -> Arc<MemoryStore> {
        if let Some(store) = self.stores.get(user) {
            return Arc::clone(store.value());
        }

        let _guard = self.open_lock.lock().await;
        if let Some(store) = self.stores.get(user) {
            return Arc::clone(store.value());
        }

        let ndims = self.services.embedder.ndims();
        let name = collection_name(&self.services.config.collection.prefix, user, ndims);
        match self.index.open_collection(&name, ndims).await {
            Ok(collection) => {
                info!(user = %user, collection = %name, "memory collection opened");
                let store = Arc::new(MemoryStore::new(collection, self.services.clone()));
                self.stores.insert(user.clone(), Arc::clone(&store));
                store
            }
            Err(err) => {
                warn!(user = %user, collection = %name, %err, "memory collection unavailable");
                Arc::new(MemoryStore::unconfigured(self.services.clone()))
            }
        }
    }

    /// Every store opened so far.
    #[must_use]
    pub fn stores(&self) -> Vec<Arc<MemoryStore>> {
        self.stores
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::mode::EmotionMode;
    use crate::memory::core::config::MemoryConfig;
    use crate::memory::core::record::NewMemory;
    use crate::memory::embedding::hashing::HashingEmbedder;
    use crate::memory::scoring::importance::ImportanceScorer;
    use crate::memory::storage::in_memory_index::InMemoryVectorIndex;

    fn registry(ndims: usize, index: Arc<dyn VectorIndex>) -> MemoryStoreRegistry {
        let services = MemoryServices::new(
            Arc::new(MemoryConfig::default()),
            Arc::new(HashingEmbedder::new(ndims)),
            Arc::new(ImportanceScorer::default()),
        );
        MemoryStoreRegistry::new(index, services)
    }

    #[test]
    fn test_collection_name_includes_dims() {
        let user = UserId::new("alice").unwrap();
        let name = collection_name("memory", &user, 256);
        assert!(name.starts_with("memory_alice_"));
        assert!(name.ends_with("__d256"));
        assert_ne!(name, collection_name("memory", &user, 768));
    }

    #[tokio::test]
    async fn test_lookalike_users_get_separate_collections() {
        let registry = registry(16, Arc::new(InMemoryVectorIndex::new()));
        let pairs = [("张三", "李四"), ("a.b@x.com", "a-b@x.com")];
        for (left, right) in pairs {
            let left = UserId::new(left).unwrap();
            let right = UserId::new(right).unwrap();
            let left_store = registry.store_for(&left).await;
            let right_store = registry.store_for(&right).await;
            assert_ne!(left_store.collection_name(), right_store.collection_name());

            left_store
                .add(NewMemory::conversation("我的密码是1234", "记住啦", EmotionMode::S1))
                .await
                .unwrap();
            assert!(!right_store.has_any().await.unwrap());
            assert_eq!(left_store.count().await.unwrap(), 1);
        }
        assert_eq!(registry.stores().len(), 4);
    }

    #[tokio::test]
    async fn test_same_user_gets_same_store() {
        let registry = registry(16, Arc::new(InMemoryVectorIndex::new()));
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();

        let first = registry.store_for(&alice).await;
        let second = registry.store_for(&alice).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_configured());

        first
            .add(NewMemory::conversation("hi", "hello", EmotionMode::S1))
            .await
            .unwrap();
        let other = registry.store_for(&bob).await;
        assert!(!other.has_any().await.unwrap());
        assert_eq!(registry.stores().len(), 2);
    }

    #[tokio::test]
    async fn test_open_failure_yields_unconfigured_store() {
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let user = UserId::new("carol").unwrap();
        // Occupy the name with a different dimension.
        index
            .open_collection(&collection_name("memory", &user, 8), 4)
            .await
            .unwrap();

        let registry = registry(8, index);
        let store = registry.store_for(&user).await;
        assert!(!store.is_configured());
        assert!(registry.stores().is_empty());
    }
}
