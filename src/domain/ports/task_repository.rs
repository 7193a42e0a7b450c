//! Task repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::SchedResult;
use crate::domain::models::Task;

/// Persistence for tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get(&self, name: &str) -> SchedResult<Option<Task>>;

    async fn exists(&self, name: &str) -> SchedResult<bool>;

    async fn insert(&self, task: &Task) -> SchedResult<()>;

    /// Write all mutable fields under optimistic version check.
    ///
    /// `Ok(false)` means affected-rows = 0: the row is gone or another
    /// actor incremented the version first. Callers treat that per their
    /// protocol (abort, or count a lost race as someone else's success).
    async fn update(&self, task: &Task) -> SchedResult<bool>;

    async fn delete(&self, name: &str) -> SchedResult<()>;

    async fn list_by_user(&self, user: &str) -> SchedResult<Vec<Task>>;

    /// Active tasks whose `end_time` passed `cutoff`; the sweep's read.
    async fn expired_active(&self, cutoff: DateTime<Utc>) -> SchedResult<Vec<Task>>;

    /// Tasks stuck in `creating` since before `cutoff`.
    async fn stale_creating(&self, cutoff: DateTime<Utc>) -> SchedResult<Vec<Task>>;

    /// The active task of the type with the greatest `end_time`.
    async fn latest_ending_active(&self, instance_type: &str) -> SchedResult<Option<Task>>;
}
