//! Task lifecycle manager.
//!
//! Owns the task state machine: create, activate, kill and delete, plus
//! the read surface a frontend serves listings from. All task-row writes
//! are versioned compare-and-swaps; a lost race means another actor
//! completed the same transition and the current one backs off.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::billing::BillingGate;
use super::placement::{Placement, PlacementOutcome};
use super::queue_engine::QueueEngine;
use super::spec_render::render_spec;
use super::target_pool::TargetPool;
use crate::domain::errors::{HypervisorError, SchedError, SchedResult};
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::{
    Hypervisor, InstanceAction, InstanceState, InstanceTypeRepository, TaskRepository,
};

/// Minimum billable lifetime.
pub const MIN_LIFETIME: Duration = Duration::from_secs(60);

/// Outcome of an accepted activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Placed immediately.
    Active,
    /// Charged and parked in the type's queue.
    Queued,
}

pub struct TaskLifecycle {
    types: Arc<dyn InstanceTypeRepository>,
    tasks: Arc<dyn TaskRepository>,
    pool: Arc<TargetPool>,
    billing: Arc<BillingGate>,
    placement: Arc<Placement>,
    queue_engine: Arc<QueueEngine>,
    hypervisor: Arc<dyn Hypervisor>,
}

impl TaskLifecycle {
    pub fn new(
        types: Arc<dyn InstanceTypeRepository>,
        tasks: Arc<dyn TaskRepository>,
        pool: Arc<TargetPool>,
        billing: Arc<BillingGate>,
        placement: Arc<Placement>,
        queue_engine: Arc<QueueEngine>,
        hypervisor: Arc<dyn Hypervisor>,
    ) -> Self {
        Self {
            types,
            tasks,
            pool,
            billing,
            placement,
            queue_engine,
            hypervisor,
        }
    }

    /// Provision a new task: insert the row as `creating`, create the
    /// instance, then settle into `inactive`.
    pub async fn create_task(
        &self,
        user: &str,
        name: &str,
        instance_type: &str,
    ) -> SchedResult<()> {
        if self.tasks.exists(name).await? {
            return Err(SchedError::TaskAlreadyExists(name.to_string()));
        }
        let ty = self
            .types
            .get(instance_type)
            .await?
            .ok_or_else(|| SchedError::InstanceTypeNotFound(instance_type.to_string()))?;
        let spec = render_spec(&ty.configure)?;

        // Template selection only: any target of the type parameterizes
        // instance creation, claimed or not.
        let template = self
            .pool
            .template_for(instance_type)
            .await?
            .ok_or_else(|| SchedError::NoTarget(instance_type.to_string()))?;

        let mut task = Task {
            name: name.to_string(),
            user: user.to_string(),
            instance_type: instance_type.to_string(),
            status: TaskStatus::Creating,
            creation: Utc::now(),
            queue_time: None,
            end_time: None,
            target_id: None,
            instance: generate_instance_name(name),
            version: 0,
        };
        self.tasks.insert(&task).await?;

        if let Err(e) = self
            .hypervisor
            .create_instance(&task.instance, &spec, &template.descriptor)
            .await
        {
            if let Err(del) = self.tasks.delete(name).await {
                warn!(task = name, error = %del, "failed to remove task after create failure");
            }
            return Err(e.into());
        }

        task.status = TaskStatus::Inactive;
        if !self.tasks.update(&task).await? {
            warn!(task = name, "creating row changed before settling inactive");
        }
        info!(task = name, instance = %task.instance, "task created");
        Ok(())
    }

    /// Charge the task's user for `lifetime` and either place it on an
    /// idle target or enqueue it.
    pub async fn activate_task(&self, name: &str, lifetime: Duration) -> SchedResult<Activation> {
        if lifetime < MIN_LIFETIME {
            return Err(SchedError::LifetimeTooShort(lifetime));
        }
        let mut task = self
            .tasks
            .get(name)
            .await?
            .ok_or_else(|| SchedError::TaskNotFound(name.to_string()))?;
        if task.status != TaskStatus::Inactive {
            return Err(SchedError::WrongState {
                task: name.to_string(),
                status: task.status.as_str().to_string(),
                expected: "inactive",
            });
        }
        let ty = self
            .types
            .get(&task.instance_type)
            .await?
            .ok_or_else(|| SchedError::InstanceTypeNotFound(task.instance_type.clone()))?;

        self.billing.charge(&task.user, &ty.price, lifetime).await?;

        task.status = TaskStatus::Queued;
        task.queue_time = Some(Utc::now());
        if !self.tasks.update(&task).await? {
            return Err(SchedError::ConcurrentWrite {
                entity: "task",
                key: name.to_string(),
            });
        }
        task.version += 1;

        match self.placement.activate(&task, lifetime, None).await? {
            PlacementOutcome::Placed => Ok(Activation::Active),
            PlacementOutcome::NoTarget => {
                self.queue_engine.enqueue(&task, lifetime).await?;
                Ok(Activation::Queued)
            }
        }
    }

    /// Terminate an active task, then hand its target to the queue.
    ///
    /// Idempotent against racing killers: whoever loses the
    /// active→terminating compare-and-swap treats the kill as already
    /// done.
    pub async fn kill_task(&self, name: &str) -> SchedResult<()> {
        let mut task = self
            .tasks
            .get(name)
            .await?
            .ok_or_else(|| SchedError::TaskNotFound(name.to_string()))?;
        if task.status != TaskStatus::Active {
            return Ok(());
        }
        task.status = TaskStatus::Terminating;
        if !self.tasks.update(&task).await? {
            return Ok(());
        }
        task.version += 1;
        info!(task = name, "killing task");

        self.stop_instance(&task.instance).await?;

        let freed_target = task.target_id;
        task.status = TaskStatus::Inactive;
        task.target_id = None;
        if !self.tasks.update(&task).await? {
            warn!(task = name, "terminating row changed before settling inactive");
        }

        let Some(target_id) = freed_target else {
            return Ok(());
        };
        let Some(target) = self.pool.get(target_id).await? else {
            // The pool was redefined under the running task; nothing to free.
            return Ok(());
        };

        let promoted = match self.queue_engine.promote(&task.instance_type, &target).await {
            Ok(promoted) => promoted,
            Err(e) => {
                self.pool.release(&target).await?;
                return Err(e);
            }
        };
        if !promoted {
            self.pool.release(&target).await?;
        }
        info!(task = name, promoted, "task killed");
        Ok(())
    }

    /// Stop with the stateful-preserving mode, downgrading to a force
    /// stop when the host lacks support. "Already stopped" is success
    /// either way.
    async fn stop_instance(&self, instance: &str) -> SchedResult<()> {
        match self
            .hypervisor
            .update_state(instance, InstanceAction::Stop, false, true)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_stopped() => Ok(()),
            Err(HypervisorError::StatefulUnsupported(reason)) => {
                info!(instance, reason = %reason, "stateful stop unsupported, forcing");
                match self
                    .hypervisor
                    .update_state(instance, InstanceAction::Stop, true, false)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_already_stopped() => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an inactive task and its instance.
    pub async fn delete_task(&self, name: &str) -> SchedResult<()> {
        let mut task = self
            .tasks
            .get(name)
            .await?
            .ok_or_else(|| SchedError::TaskNotFound(name.to_string()))?;
        if task.status != TaskStatus::Inactive {
            return Err(SchedError::WrongState {
                task: name.to_string(),
                status: task.status.as_str().to_string(),
                expected: "inactive",
            });
        }
        task.status = TaskStatus::Deleting;
        if !self.tasks.update(&task).await? {
            return Err(SchedError::ConcurrentWrite {
                entity: "task",
                key: name.to_string(),
            });
        }

        self.hypervisor.delete_instance(&task.instance).await?;
        self.tasks.delete(name).await?;
        info!(task = name, "task deleted");
        Ok(())
    }

    pub async fn get_task(&self, name: &str) -> SchedResult<Task> {
        self.tasks
            .get(name)
            .await?
            .ok_or_else(|| SchedError::TaskNotFound(name.to_string()))
    }

    pub async fn list_user_tasks(&self, user: &str) -> SchedResult<Vec<Task>> {
        self.tasks.list_by_user(user).await
    }

    /// Point-in-time resource state of an instance, straight from the
    /// hypervisor.
    pub async fn instance_state(&self, instance: &str) -> SchedResult<InstanceState> {
        Ok(self.hypervisor.instance_state(instance).await?)
    }

    /// Operator passthrough for raw power actions on an instance.
    pub async fn change_instance_state(
        &self,
        instance: &str,
        action: InstanceAction,
        force: bool,
        stateful: bool,
    ) -> SchedResult<()> {
        Ok(self
            .hypervisor
            .update_state(instance, action, force, stateful)
            .await?)
    }
}

fn generate_instance_name(task: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("task-{task}-{}", &suffix[..8])
}
