//! Queue repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::SchedResult;
use crate::domain::models::QueueEntry;

/// Persistence for the per-type FIFO queues.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert an entry, returning its id. `entry.creation` is preserved so
    /// a re-inserted entry keeps its place in the FIFO.
    async fn insert(&self, entry: &QueueEntry) -> SchedResult<i64>;

    /// Oldest entry for the type: `creation` ascending, ties by id.
    async fn head(&self, instance_type: &str) -> SchedResult<Option<QueueEntry>>;

    /// Delete by id; `Ok(false)` when another promoter popped it first.
    async fn delete(&self, id: i64) -> SchedResult<bool>;

    async fn delete_for_task(&self, task: &str) -> SchedResult<u64>;

    /// Entries of the type created strictly before `at`, FIFO order.
    async fn entries_before(&self, instance_type: &str, at: DateTime<Utc>)
        -> SchedResult<Vec<QueueEntry>>;

    async fn count_for_task(&self, task: &str) -> SchedResult<i64>;
}
