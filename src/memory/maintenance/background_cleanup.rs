//! Periodic cleanup over every open memory store.
//!
//! Each cycle runs the low-quality pass store by store, preceded by the
//! relevance pass for the configured default mode when
//! `maintenance.relevance_sweep` is set. A failing store is logged and
//! skipped; the loop keeps going until shutdown is signaled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::memory::engine::registry::MemoryStoreRegistry;

/// Totals from one cleanup cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Stores visited.
    pub stores: usize,
    /// Records deleted by the relevance pass.
    pub irrelevant_deleted: usize,
    /// Records deleted by the low-quality pass.
    pub low_quality_deleted: usize,
    /// Stores whose pass failed.
    pub failures: usize,
    /// Cycle duration in milliseconds.
    pub duration_ms: u64,
}

/// Background worker sweeping the registry on an interval.
pub struct BackgroundCleanup {
    registry: Arc<MemoryStoreRegistry>,
    shutdown: Arc<Notify>,
}

impl BackgroundCleanup {
    /// Worker over `registry`, configured from its memory config.
    #[must_use]
    pub fn new(registry: Arc<MemoryStoreRegistry>) -> Self {
        Self {
            registry,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Notifier that stops the loop.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the loop as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let maintenance = &self.registry.services().config.maintenance;
        if !maintenance.periodic_enabled {
            info!("periodic memory cleanup is disabled");
            return;
        }

        let interval = Duration::from_secs(maintenance.interval_seconds);
        info!(?interval, "starting periodic memory cleanup");

        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    let stats = self.run_cleanup().await;
                    if stats.irrelevant_deleted > 0 || stats.low_quality_deleted > 0 {
                        info!(
                            stores = stats.stores,
                            irrelevant = stats.irrelevant_deleted,
                            low_quality = stats.low_quality_deleted,
                            failures = stats.failures,
                            duration_ms = stats.duration_ms,
                            "memory cleanup completed"
                        );
                    } else {
                        debug!(stores = stats.stores, failures = stats.failures, "memory cleanup found nothing to remove");
                    }
                }
                () = self.shutdown.notified() => {
                    info!("periodic memory cleanup shutting down");
                    break;
                }
            }
        }
    }

    /// Run one cycle over every open store.
    pub async fn run_cleanup(&self) -> CleanupStats {
        let start = Instant::now();
        let config = &self.registry.services().config;
        let relevance_mode = config
            .maintenance
            .relevance_sweep
            .then_some(config.cleanup.default_mode);
        let mut stats = CleanupStats::default();

        for store in self.registry.stores() {
            stats.stores += 1;
            let collection = store.collection_name().unwrap_or_default().to_string();

            if let Some(mode) = relevance_mode {
                match store.clean_up(mode).await {
                    Ok(report) => stats.irrelevant_deleted += report.deleted,
                    Err(err) => {
                        stats.failures += 1;
                        warn!(%collection, %err, "relevance cleanup failed");
                        continue;
                    }
                }
            }
            match store.clean_up_low_quality().await {
                Ok(report) => stats.low_quality_deleted += report.deleted,
                Err(err) => {
                    stats.failures += 1;
                    warn!(%collection, %err, "low-quality cleanup failed");
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        {
            stats.duration_ms = start.elapsed().as_millis() as u64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::mode::EmotionMode;
    use crate::memory::core::config::MemoryConfig;
    use crate::memory::core::ids::UserId;
    use crate::memory::core::record::NewMemory;
    use crate::memory::embedding::hashing::HashingEmbedder;
    use crate::memory::engine::store::MemoryServices;
    use crate::memory::scoring::importance::ImportanceScorer;
    use crate::memory::storage::in_memory_index::InMemoryVectorIndex;

    fn registry(config: MemoryConfig) -> Arc<MemoryStoreRegistry> {
        let services = MemoryServices::new(
            Arc::new(config),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(ImportanceScorer::default()),
        );
        Arc::new(MemoryStoreRegistry::new(
            Arc::new(InMemoryVectorIndex::new()),
            services,
        ))
    }

    #[tokio::test]
    async fn test_default_cycle_keeps_fresh_memories() {
        let registry = registry(MemoryConfig::default());
        let store = registry.store_for(&UserId::new("alice").unwrap()).await;
        for (user_text, reply_text) in [
            ("[INIT]", "哥哥，你来啦～"),
            ("今天考试考得怎么样", "考得很好哦"),
            ("晚安", "哥哥晚安"),
        ] {
            store
                .add(NewMemory::conversation(user_text, reply_text, EmotionMode::S1))
                .await
                .unwrap();
        }

        let stats = BackgroundCleanup::new(Arc::clone(&registry)).run_cleanup().await;
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.irrelevant_deleted, 0);
        assert_eq!(stats.low_quality_deleted, 0);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cycle_visits_every_store() {
        let mut config = MemoryConfig::default();
        config.maintenance.relevance_sweep = true;
        // Nothing clears the relevance bar.
        config.relevance.threshold = 10.0;
        let registry = registry(config);
        for name in ["a", "b"] {
            let store = registry.store_for(&UserId::new(name).unwrap()).await;
            store
                .add(NewMemory::conversation("hi", "hello", EmotionMode::S1))
                .await
                .unwrap();
        }

        let stats = BackgroundCleanup::new(Arc::clone(&registry)).run_cleanup().await;
        assert_eq!(stats.stores, 2);
        assert_eq!(stats.irrelevant_deleted, 2);
        assert_eq!(stats.failures, 0);
        for store in registry.stores() {
            assert!(!store.has_any().await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_disabled_loop_returns_immediately() {
        let mut config = MemoryConfig::default();
        config.maintenance.periodic_enabled = false;
        let worker = BackgroundCleanup::new(registry(config));
        tokio::time::timeout(Duration::from_secs(1), worker.spawn())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let worker = BackgroundCleanup::new(registry(MemoryConfig::default()));
        let shutdown = worker.shutdown_notifier();
        let handle = worker.spawn();
        tokio::task::yield_now().await;
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
