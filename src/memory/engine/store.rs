//! Per-user memory store.
//!
//! The store is the only reader and writer of one user's collection. Every
//! public operation holds the store lock for its whole multi-step sequence
//! (embed → upsert, query → bump access stats → re-rank, scan → delete).
//! A store without a collection answers with empty results and no-ops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::emotion::mode::EmotionMode;
use crate::memory::core::config::MemoryConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::MemoryId;
use crate::memory::core::record::{
    MemoryRecord, NewMemory, clamp_importance, dedup_tags, render_document,
};
use crate::memory::embedding::embedder::Embedder;
use crate::memory::maintenance::task_pool::BackgroundTasks;
use crate::memory::retrieval::ranking::{
    RetrievedMemory, ScoredMemory, rank_composite, sort_retrieved,
};
use crate::memory::scoring::importance::ImportanceScorer;
use crate::memory::scoring::relevance::RelevanceEvaluator;
use crate::memory::storage::vector_index::{IndexHit, StoredDocument, VectorCollection};

/// Collaborators shared by every store.
#[derive(Clone)]
pub struct MemoryServices {
    /// Memory configuration.
    pub config: Arc<MemoryConfig>,
    /// Embedding model (or the hashing fallback).
    pub embedder: Arc<dyn Embedder>,
    /// Importance heuristic.
    pub scorer: Arc<ImportanceScorer>,
    /// Background worker pool.
    pub tasks: BackgroundTasks,
}

impl MemoryServices {
    /// Bundle collaborators, sizing the worker pool from the config.
    #[must_use]
    pub fn new(
        config: Arc<MemoryConfig>,
        embedder: Arc<dyn Embedder>,
        scorer: Arc<ImportanceScorer>,
    ) -> Self {
        let maintenance = &config.maintenance;
        let tasks = BackgroundTasks::new(maintenance.max_concurrent_tasks, maintenance.max_queued_tasks);
        Self {
            config,
            embedder,
            scorer,
            tasks,
        }
    }
}

/// Counts produced by a cleanup pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Records examined.
    pub scanned: usize,
    /// Records deleted.
    pub deleted: usize,
}

/// Memory collection of one user.
pub struct MemoryStore {
    collection: Option<Arc<dyn VectorCollection>>,
    services: MemoryServices,
    evaluator: RelevanceEvaluator,
    lock: Mutex<()>,
}

impl MemoryStore {
    /// Store backed by `collection`.
    #[must_use]
    pub fn new(collection: Arc<dyn VectorCollection>, services: MemoryServices) -> Self {
        Self::build(Some(collection), services)
    }

    /// Store with no collection; reads are empty and writes are dropped.
    #[must_use]
    pub fn unconfigured(services: MemoryServices) -> Self {
        Self::build(None, services)
    }

    fn build(collection: Option<Arc<dyn VectorCollection>>, services: MemoryServices) -> Self {
        let evaluator = RelevanceEvaluator::new(Arc::clone(&services.config));
        Self {
            collection,
            services,
            evaluator,
            lock: Mutex::new(()),
        }
    }

    /// Whether a collection is attached.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.collection.is_some()
    }

    /// Collection name, if any.
    #[must_use]
    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_ref().map(|collection| collection.name())
    }

    /// Retention rules used by this store.
    #[must_use]
    pub const fn evaluator(&self) -> &RelevanceEvaluator {
        &self.evaluator
    }

    /// Score, tag, embed and persist a new memory.
    ///
    /// Returns `None` when the store has no collection.
    ///
    /// # Errors
    /// Returns an error if embedding or the index write fails.
    pub async fn add(&self, draft: NewMemory) -> MemoryResult<Option<MemoryId>> {
        let _guard = self.lock.lock().await;
        let Some(collection) = &self.collection else {
            return Ok(None);
        };

        let config = &self.services.config;
        let importance = draft.importance.map_or_else(
            || {
                self.services
                    .scorer
                    .score(&draft.user_text, &draft.reply_text, draft.mode)
            },
            clamp_importance,
        );
        let tags = draft.tags.map_or_else(
            || auto_tags(config, &draft.user_text, &draft.reply_text, draft.mode),
            dedup_tags,
        );
        let content = render_document(
            &config.collection,
            &draft.user_text,
            &draft.reply_text,
            draft.mode,
        );
        let vector = self.embed(&content).await?;

        let now = Utc::now();
        let record = MemoryRecord {
            id: MemoryId::new(),
            content,
            user_text: draft.user_text,
            reply_text: draft.reply_text,
            created_at: now,
            last_accessed_at: now,
            mode: draft.mode,
            memory_type: draft.memory_type,
            category: draft.category,
            tags,
            sentiment: draft.sentiment,
            priority: draft.priority,
            importance,
            access_count: 0,
        }
        .normalized();

        let id = record.id;
        collection
            .upsert(
                StoredDocument {
                    id,
                    document: record.content.clone(),
                    metadata: record.to_metadata(),
                },
                vector,
            )
            .await?;
        debug!(
            collection = collection.name(),
            %id,
            importance = record.importance,
            "memory added"
        );
        Ok(Some(id))
    }

    /// Nearest `k` records, with access statistics bumped and persisted.
    /// A record whose statistics cannot be written is still returned.
    ///
    /// Order: distance ascending, then priority descending, then importance
    /// descending.
    ///
    /// # Errors
    /// Returns an error if embedding or the index fails.
    pub async fn retrieve(&self, query: &str, k: usize) -> MemoryResult<Vec<RetrievedMemory>> {
        let _guard = self.lock.lock().await;
        let Some(collection) = &self.collection else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed(query).await?;
        let hits = collection.query(&vector, k).await?;
        let now = Utc::now();
        let mut retrieved = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut candidate = decode_hit(hit, now);
            candidate.record.record_access(now);
            retrieved.push(candidate);
        }
        persist_access(collection.as_ref(), retrieved.iter().map(|m| &m.record)).await;

        sort_retrieved(&mut retrieved);
        retrieved.truncate(k);
        Ok(retrieved)
    }

    /// Top `k` records by composite score, highest first.
    ///
    /// Candidates are scored on their stored statistics; only the returned
    /// records have their access statistics bumped, once.
    ///
    /// # Errors
    /// Returns an error if embedding or the index fails.
    pub async fn smart_retrieve(
        &self,
        query: &str,
        mode: EmotionMode,
        k: usize,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        let _guard = self.lock.lock().await;
        let Some(collection) = &self.collection else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let smart = &self.services.config.smart;
        let vector = self.embed(query).await?;
        let hits = collection
            .query(&vector, k.saturating_mul(smart.candidate_multiplier))
            .await?;
        let now = Utc::now();
        let candidates = hits.into_iter().map(|hit| decode_hit(hit, now)).collect();

        let mut ranked = rank_composite(candidates, query, mode, smart, k, now);
        for scored in &mut ranked {
            scored.record.record_access(now);
        }
        persist_access(collection.as_ref(), ranked.iter().map(|m| &m.record)).await;
        Ok(ranked)
    }

    /// Delete every record that fails the relevance check for `mode`.
    ///
    /// # Errors
    /// Returns an error if the index cannot be scanned or updated.
    pub async fn clean_up(&self, mode: EmotionMode) -> MemoryResult<CleanupReport> {
        let now = Utc::now();
        self.sweep("relevance", |record| {
            !self.evaluator.check_relevance(record, mode, now)
        })
        .await
    }

    /// Delete every low-quality record.
    ///
    /// # Errors
    /// Returns an error if the index cannot be scanned or updated.
    pub async fn clean_up_low_quality(&self) -> MemoryResult<CleanupReport> {
        let now = Utc::now();
        self.sweep("low_quality", |record| self.evaluator.is_low_quality(record, now))
            .await
    }

    /// Delete every record.
    ///
    /// # Errors
    /// Returns an error if the index cannot be scanned or updated.
    pub async fn clear_all(&self) -> MemoryResult<CleanupReport> {
        self.sweep("clear_all", |_| true).await
    }

    /// Whether the collection holds at least one record.
    ///
    /// # Errors
    /// Returns an error if the index cannot be queried.
    pub async fn has_any(&self) -> MemoryResult<bool> {
        Ok(self.count().await? > 0)
    }

    /// Number of stored records.
    ///
    /// # Errors
    /// Returns an error if the index cannot be queried.
    pub async fn count(&self) -> MemoryResult<usize> {
        let _guard = self.lock.lock().await;
        match &self.collection {
            Some(collection) => collection.count().await,
            None => Ok(0),
        }
    }

    /// Snapshot of every stored record.
    ///
    /// # Errors
    /// Returns an error if the index cannot be scanned.
    pub async fn records(&self) -> MemoryResult<Vec<MemoryRecord>> {
        let _guard = self.lock.lock().await;
        let Some(collection) = &self.collection else {
            return Ok(Vec::new());
        };
        let now = Utc::now();
        Ok(collection
            .get_all()
            .await?
            .iter()
            .map(|stored| MemoryRecord::from_stored(stored.id, &stored.document, &stored.metadata, now))
            .collect())
    }

    /// Run the low-quality pass in the background after the configured delay.
    ///
    /// The handle may be dropped; failures are logged by the pool.
    pub fn schedule_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let delay = Duration::from_millis(self.services.config.maintenance.delay_ms);
        self.services.tasks.spawn("memory_maintenance", async move {
            tokio::time::sleep(delay).await;
            let report = store.clean_up_low_quality().await?;
            if report.deleted > 0 {
                info!(
                    collection = store.collection_name().unwrap_or_default(),
                    deleted = report.deleted,
                    "scheduled maintenance removed low-quality memories"
                );
            }
            Ok::<(), MemoryError>(())
        })
    }

    async fn sweep<F>(&self, pass: &'static str, mut doomed: F) -> MemoryResult<CleanupReport>
    where
        F: FnMut(&MemoryRecord) -> bool,
    {
        let _guard = self.lock.lock().await;
        let Some(collection) = &self.collection else {
            return Ok(CleanupReport::default());
        };

        let now = Utc::now();
        let snapshot = collection.get_all().await?;
        let scanned = snapshot.len();
        let ids: Vec<MemoryId> = snapshot
            .iter()
            .map(|stored| MemoryRecord::from_stored(stored.id, &stored.document, &stored.metadata, now))
            .filter(|record| doomed(record))
            .map(|record| record.id)
            .collect();

        let deleted = if ids.is_empty() {
            0
        } else {
            collection.delete(ids).await?
        };
        debug!(collection = collection.name(), pass, scanned, deleted, "memory sweep finished");
        Ok(CleanupReport { scanned, deleted })
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f64>> {
        let limit = Duration::from_secs(self.services.config.embedding.timeout_seconds);
        tokio::time::timeout(limit, self.services.embedder.embed_text(text))
            .await
            .map_err(|_| MemoryError::Embedding(format!("embedding timed out after {limit:?}")))?
    }
}

/// Write bumped access statistics back; a failed update is logged and the
/// rest still go through.
async fn persist_access<'r>(
    collection: &dyn VectorCollection,
    records: impl Iterator<Item = &'r MemoryRecord> + Send,
) {
    for record in records {
        if let Err(err) = collection
            .update_metadata(record.id, record.access_metadata())
            .await
        {
            warn!(
                collection = collection.name(),
                id = %record.id,
                err = %err,
                "failed to persist access statistics"
            );
        }
    }
}

fn decode_hit(hit: IndexHit, now: chrono::DateTime<Utc>) -> RetrievedMemory {
    let IndexHit { entry, distance } = hit;
    RetrievedMemory {
        distance,
        record: MemoryRecord::from_stored(entry.id, &entry.document, &entry.metadata, now),
    }
}

/// Tags derived from a turn: the mode tag plus configured keywords found in
/// either side.
#[must_use]
pub fn auto_tags(config: &MemoryConfig, user_text: &str, reply_text: &str, mode: EmotionMode) -> Vec<String> {
    let labels = &config.collection;
    let mut tags = vec![format!("state_{mode}")];
    tags.extend(
        labels
            .user_tag_keywords
            .iter()
            .filter(|keyword| user_text.contains(keyword.as_str()))
            .cloned(),
    );
    tags.extend(
        labels
            .assistant_tag_keywords
            .iter()
            .filter(|keyword| reply_text.contains(keyword.as_str()))
            .cloned(),
    );
    dedup_tags(tags)
}
