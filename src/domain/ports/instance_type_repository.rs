//! Instance type repository port.

use async_trait::async_trait;

use crate::domain::errors::SchedResult;
use crate::domain::models::{InstanceType, TargetDescriptor};

/// Persistence for instance types and their target pools.
///
/// The target-set mutations live here because defining or deleting a type
/// must change the type row and its target rows in one transaction.
#[async_trait]
pub trait InstanceTypeRepository: Send + Sync {
    async fn get(&self, name: &str) -> SchedResult<Option<InstanceType>>;

    async fn list(&self) -> SchedResult<Vec<InstanceType>>;

    /// Upsert the type and replace its whole target set with fresh idle
    /// targets, atomically.
    async fn replace_with_targets(
        &self,
        instance_type: &InstanceType,
        targets: &[TargetDescriptor],
    ) -> SchedResult<()>;

    /// Delete the type and cascade to its targets, atomically.
    async fn delete_cascade(&self, name: &str) -> SchedResult<()>;
}
