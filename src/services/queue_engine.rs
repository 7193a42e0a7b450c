//! Queue engine: per-type FIFO of charged tasks waiting for a target.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::placement::{Placement, PlacementOutcome};
use super::target_pool::TargetPool;
use crate::domain::errors::SchedResult;
use crate::domain::models::{QueueEntry, Target, Task};
use crate::domain::ports::{QueueRepository, TaskRepository};

pub struct QueueEngine {
    queue: Arc<dyn QueueRepository>,
    tasks: Arc<dyn TaskRepository>,
    pool: Arc<TargetPool>,
    placement: Arc<Placement>,
}

impl QueueEngine {
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        tasks: Arc<dyn TaskRepository>,
        pool: Arc<TargetPool>,
        placement: Arc<Placement>,
    ) -> Self {
        Self {
            queue,
            tasks,
            pool,
            placement,
        }
    }

    /// Park a charged task that found no idle target.
    pub async fn enqueue(&self, task: &Task, lifetime: Duration) -> SchedResult<()> {
        let entry = QueueEntry {
            id: 0,
            user: task.user.clone(),
            task: task.name.clone(),
            instance_type: task.instance_type.clone(),
            lifetime,
            creation: Utc::now(),
        };
        self.queue.insert(&entry).await?;
        info!(task = %task.name, instance_type = %task.instance_type, "task queued");
        Ok(())
    }

    /// Hand a just-freed busy target to the oldest queued task of the
    /// type. Returns whether a task took the target; on `false` the
    /// caller still owns it and must release.
    ///
    /// The pop is compensated: any failure between deleting the entry and
    /// a successful placement re-inserts it with its original creation
    /// timestamp, so the task keeps its place in the FIFO.
    pub async fn promote(&self, instance_type: &str, target: &Target) -> SchedResult<bool> {
        let Some(entry) = self.queue.head(instance_type).await? else {
            return Ok(false);
        };
        if !self.queue.delete(entry.id).await? {
            // Another promoter popped it first.
            return Ok(false);
        }
        let Some(task) = self.tasks.get(&entry.task).await? else {
            warn!(task = %entry.task, "queued task vanished, dropping its entry");
            return Ok(false);
        };

        let Some(rebound) = self.pool.rebind(target, &task.name, &task.instance).await? else {
            self.requeue(&entry).await?;
            return Ok(false);
        };

        match self.placement.activate(&task, entry.lifetime, Some(rebound)).await {
            Ok(PlacementOutcome::Placed) => {
                info!(task = %task.name, target = target.id, "promoted from queue");
                Ok(true)
            }
            // Unreachable with a preclaimed target, but compensate anyway.
            Ok(PlacementOutcome::NoTarget) => {
                self.requeue(&entry).await?;
                Ok(false)
            }
            Err(e) => {
                warn!(task = %task.name, error = %e, "promotion failed, requeueing");
                self.requeue(&entry).await?;
                Ok(false)
            }
        }
    }

    async fn requeue(&self, entry: &QueueEntry) -> SchedResult<()> {
        self.queue.insert(entry).await?;
        Ok(())
    }
}
