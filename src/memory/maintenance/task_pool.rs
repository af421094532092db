//! Bounded pool for fire-and-forget background work.
//!
//! Every task runs inside its own spawned task, so an error or a panic ends at
//! that boundary and is logged. The caller only receives a handle it is free
//! to drop. At most `capacity` tasks are admitted (running or waiting for a
//! slot); anything beyond that is logged and dropped.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Background task runner with a concurrency limit and a bounded backlog.
#[derive(Clone, Debug)]
pub struct BackgroundTasks {
    permits: Arc<Semaphore>,
    admitted: Arc<Semaphore>,
    limit: usize,
    capacity: usize,
}

impl BackgroundTasks {
    /// Pool running at most `max_concurrent` tasks at once (at least one) and
    /// holding at most `max_queued` in total (never fewer than the limit).
    #[must_use]
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let limit = max_concurrent.max(1);
        let capacity = max_queued.max(limit);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            admitted: Arc::new(Semaphore::new(capacity)),
            limit,
            capacity,
        }
    }

    /// Maximum tasks running at once.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Maximum tasks admitted at once, running or waiting.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks currently holding a slot.
    #[must_use]
    pub fn running(&self) -> usize {
        self.limit.saturating_sub(self.permits.available_permits())
    }

    /// Tasks admitted and not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.admitted.available_permits())
    }

    /// Queue `task`; failures and panics are logged under `label`.
    ///
    /// When the backlog is full the task is dropped without running and the
    /// returned handle completes immediately.
    pub fn spawn<F, E>(&self, label: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Ok(ticket) = Arc::clone(&self.admitted).try_acquire_owned() else {
            warn!(task = label, capacity = self.capacity, "background backlog full, dropping task");
            return tokio::spawn(async {});
        };
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _ticket = ticket;
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(task = label, "background pool closed, dropping task");
                return;
            };
            match tokio::spawn(task).await {
                Ok(Ok(())) => debug!(task = label, "background task finished"),
                Ok(Err(err)) => warn!(task = label, %err, "background task failed"),
                Err(join) if join.is_panic() => error!(task = label, "background task panicked"),
                Err(join) => warn!(task = label, %join, "background task cancelled"),
            }
        })
    }
}
