//! Target repository port.

use async_trait::async_trait;

use crate::domain::errors::SchedResult;
use crate::domain::models::Target;

/// Persistence for targets.
///
/// All mutating operations are optimistic compare-and-swaps on the row
/// version; `Ok(false)` means affected-rows = 0, i.e. another actor moved
/// the row first.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    async fn get(&self, id: i64) -> SchedResult<Option<Target>>;

    /// Lowest-id idle target of the type, if any.
    async fn first_idle(&self, instance_type: &str) -> SchedResult<Option<Target>>;

    /// Any target of the type regardless of status, preferring idle ones.
    /// Used only as a render template at task creation, never as a claim.
    async fn any_for_type(&self, instance_type: &str) -> SchedResult<Option<Target>>;

    async fn exists_idle(&self, instance_type: &str) -> SchedResult<bool>;

    /// idle → busy, binding `task` and `instance`.
    async fn claim(&self, target: &Target, task: &str, instance: &str) -> SchedResult<bool>;

    /// busy → idle, clearing the bindings.
    async fn release(&self, target: &Target) -> SchedResult<bool>;

    /// busy → busy with new bindings; the promotion path, no idle window.
    async fn rebind(&self, target: &Target, task: &str, instance: &str) -> SchedResult<bool>;

    async fn list_for_type(&self, instance_type: &str) -> SchedResult<Vec<Target>>;
}
