//! Background maintenance for the memory system.

pub mod background_cleanup;
pub mod task_pool;

pub use background_cleanup::{BackgroundCleanup, CleanupStats};
pub use task_pool::BackgroundTasks;
