//! Placement: bring a charged task up on a target.
//!
//! Shared by the activation request path (which claims a target itself)
//! and the promotion path (which passes the just-freed, already-rebound
//! target). Every failure after a target is held releases it before the
//! error propagates, so no error path can strand a busy target without a
//! running task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::reaper::ExpiryHandle;
use super::spec_render::render_spec;
use super::target_pool::TargetPool;
use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::{Target, Task, TaskStatus};
use crate::domain::ports::{Hypervisor, InstanceTypeRepository, TaskRepository};

/// Result of a placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// The task is active on a target.
    Placed,
    /// No idle target was available; the caller enqueues.
    NoTarget,
}

pub struct Placement {
    types: Arc<dyn InstanceTypeRepository>,
    tasks: Arc<dyn TaskRepository>,
    pool: Arc<TargetPool>,
    hypervisor: Arc<dyn Hypervisor>,
    expiry: ExpiryHandle,
}

impl Placement {
    pub fn new(
        types: Arc<dyn InstanceTypeRepository>,
        tasks: Arc<dyn TaskRepository>,
        pool: Arc<TargetPool>,
        hypervisor: Arc<dyn Hypervisor>,
        expiry: ExpiryHandle,
    ) -> Self {
        Self {
            types,
            tasks,
            pool,
            hypervisor,
            expiry,
        }
    }

    /// Activate `task` for `lifetime` on `preclaimed`, or on a freshly
    /// claimed target of its type when none is passed.
    pub async fn activate(
        &self,
        task: &Task,
        lifetime: Duration,
        preclaimed: Option<Target>,
    ) -> SchedResult<PlacementOutcome> {
        let target = match preclaimed {
            Some(target) => target,
            None => {
                match self
                    .pool
                    .claim(&task.instance_type, &task.name, &task.instance)
                    .await?
                {
                    Some(target) => target,
                    None => return Ok(PlacementOutcome::NoTarget),
                }
            }
        };

        let instance_type = match self.types.get(&task.instance_type).await? {
            Some(instance_type) => instance_type,
            None => {
                self.pool.release(&target).await?;
                return Err(SchedError::InstanceTypeNotFound(task.instance_type.clone()));
            }
        };
        let spec = match render_spec(&instance_type.configure) {
            Ok(spec) => spec,
            Err(e) => {
                self.pool.release(&target).await?;
                return Err(e);
            }
        };

        if let Err(e) = self
            .hypervisor
            .start_instance(&task.instance, &spec, &target.descriptor)
            .await
        {
            warn!(task = %task.name, target = target.id, error = %e, "start failed, releasing target");
            self.pool.release(&target).await?;
            return Err(e.into());
        }

        let mut active = task.clone();
        active.status = TaskStatus::Active;
        active.end_time = Some(Utc::now() + chrono::Duration::seconds(lifetime.as_secs() as i64));
        active.target_id = Some(target.id);
        if !self.tasks.update(&active).await? {
            // The row moved while the instance came up; undo the claim and
            // let the caller retry against the fresh row.
            self.pool.release(&target).await?;
            return Err(SchedError::ConcurrentWrite {
                entity: "task",
                key: task.name.clone(),
            });
        }

        if let Some(end_time) = active.end_time {
            self.expiry.arm(&active.name, end_time);
        }
        info!(task = %task.name, target = target.id, "task active");
        Ok(PlacementOutcome::Placed)
    }
}
