//! Target pool: the mutual-exclusion authority over targets.
//!
//! All status changes of target rows go through this service. A claim is a
//! single idle→busy compare-and-swap; of any number of concurrent
//! claimants exactly one sees affected-rows = 1 and the rest observe a
//! miss and fall back to the queue.

use std::sync::Arc;

use tracing::warn;

use crate::domain::errors::SchedResult;
use crate::domain::models::{Target, TargetStatus};
use crate::domain::ports::TargetRepository;

pub struct TargetPool {
    targets: Arc<dyn TargetRepository>,
}

impl TargetPool {
    pub fn new(targets: Arc<dyn TargetRepository>) -> Self {
        Self { targets }
    }

    /// Claim an idle target of the type for `task`, binding the task and
    /// instance names. Returns `None` when no idle target exists or when
    /// the chosen one was taken by a concurrent claimant first.
    pub async fn claim(
        &self,
        instance_type: &str,
        task: &str,
        instance: &str,
    ) -> SchedResult<Option<Target>> {
        let Some(mut target) = self.targets.first_idle(instance_type).await? else {
            return Ok(None);
        };
        if !self.targets.claim(&target, task, instance).await? {
            return Ok(None);
        }
        target.status = TargetStatus::Busy;
        target.task = task.to_string();
        target.instance = instance.to_string();
        target.version += 1;
        Ok(Some(target))
    }

    /// Return a target to idle. A version miss means another actor already
    /// moved the row (typically a promotion rebind followed by its own
    /// release); that counts as done.
    pub async fn release(&self, target: &Target) -> SchedResult<()> {
        if !self.targets.release(target).await? {
            warn!(target = target.id, "release skipped, target row moved");
        }
        Ok(())
    }

    /// Hand a busy target straight to the next task with no idle window.
    /// Returns the rebound row, or `None` on a version miss.
    pub async fn rebind(
        &self,
        target: &Target,
        task: &str,
        instance: &str,
    ) -> SchedResult<Option<Target>> {
        if !self.targets.rebind(target, task, instance).await? {
            return Ok(None);
        }
        let mut rebound = target.clone();
        rebound.task = task.to_string();
        rebound.instance = instance.to_string();
        rebound.version += 1;
        Ok(Some(rebound))
    }

    pub async fn get(&self, id: i64) -> SchedResult<Option<Target>> {
        self.targets.get(id).await
    }

    /// Any target of the type, used only as a render template at task
    /// creation. Not a claim.
    pub async fn template_for(&self, instance_type: &str) -> SchedResult<Option<Target>> {
        self.targets.any_for_type(instance_type).await
    }

    pub async fn has_idle(&self, instance_type: &str) -> SchedResult<bool> {
        self.targets.exists_idle(instance_type).await
    }
}
