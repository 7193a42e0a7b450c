//! Queue-time estimator.
//!
//! Bounds the wait of a hypothetical task: the sum of every lifetime
//! already queued ahead of the observation time, plus the remaining time
//! of the latest-ending active task when no idle target exists. The
//! latest-ending choice is a deliberate upper-bound approximation, not a
//! simulation of the pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::target_pool::TargetPool;
use crate::domain::errors::SchedResult;
use crate::domain::ports::{QueueRepository, TaskRepository};

pub struct QueueTimeEstimator {
    queue: Arc<dyn QueueRepository>,
    tasks: Arc<dyn TaskRepository>,
    pool: Arc<TargetPool>,
}

impl QueueTimeEstimator {
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        tasks: Arc<dyn TaskRepository>,
        pool: Arc<TargetPool>,
    ) -> Self {
        Self { queue, tasks, pool }
    }

    /// Estimated wait for a task of `instance_type` queued at `at`.
    pub async fn estimate(&self, instance_type: &str, at: DateTime<Utc>) -> SchedResult<Duration> {
        let mut total = Duration::ZERO;
        for entry in self.queue.entries_before(instance_type, at).await? {
            total += entry.lifetime;
        }

        if !self.pool.has_idle(instance_type).await? {
            if let Some(task) = self.tasks.latest_ending_active(instance_type).await? {
                if let Some(end_time) = task.end_time {
                    let now = Utc::now();
                    if end_time > now {
                        total += (end_time - now).to_std().unwrap_or(Duration::ZERO);
                    }
                }
            }
        }
        Ok(total)
    }
}
