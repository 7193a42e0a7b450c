//! Expiry reaper.
//!
//! Two redundant mechanisms end every prepaid lifetime: a per-task timer
//! armed at activation (low latency, lost on restart) and a periodic
//! sweep over `active` rows with an expired `end_time` (the restart-proof
//! fallback). The sweep trails the clock by a slack interval so it never
//! races a timer that is about to fire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::lifecycle::TaskLifecycle;
use crate::domain::errors::SchedResult;
use crate::domain::models::SchedulerConfig;
use crate::domain::ports::TaskRepository;

/// A pending per-task expiry.
#[derive(Debug, Clone)]
pub struct Expiry {
    pub task: String,
    pub deadline: DateTime<Utc>,
}

/// Sender half handed to placement; armed expiries flow to the reaper.
#[derive(Clone)]
pub struct ExpiryHandle {
    tx: mpsc::UnboundedSender<Expiry>,
}

impl ExpiryHandle {
    /// Arm a timer. A closed channel is tolerated: the sweep catches the
    /// deadline on its next pass.
    pub fn arm(&self, task: &str, deadline: DateTime<Utc>) {
        let expiry = Expiry {
            task: task.to_string(),
            deadline,
        };
        if self.tx.send(expiry).is_err() {
            warn!(task, "reaper not running, expiry left to the sweep");
        }
    }
}

pub fn expiry_channel() -> (ExpiryHandle, mpsc::UnboundedReceiver<Expiry>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ExpiryHandle { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Interval between sweeps.
    pub sweep_interval: Duration,
    /// Slack subtracted from now when selecting expired tasks.
    pub expiry_slack: Duration,
    /// Age after which a `creating` row counts as orphaned.
    pub creating_grace: Duration,
    /// Purge orphaned `creating` rows when the loop starts.
    pub run_startup_purge: bool,
    /// Stop the loop after this many consecutive sweep failures.
    pub max_consecutive_failures: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            expiry_slack: Duration::from_secs(30),
            creating_grace: Duration::from_secs(3600),
            run_startup_purge: true,
            max_consecutive_failures: 5,
        }
    }
}

impl ReaperConfig {
    pub fn from_scheduler_config(config: &SchedulerConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.cron_interval_secs),
            expiry_slack: Duration::from_secs(config.expiry_slack_secs),
            creating_grace: Duration::from_secs(config.creating_grace_secs),
            ..Default::default()
        }
    }
}

pub struct Reaper {
    lifecycle: Arc<TaskLifecycle>,
    tasks: Arc<dyn TaskRepository>,
    config: ReaperConfig,
    shutdown: Arc<AtomicBool>,
}

impl Reaper {
    pub fn new(
        lifecycle: Arc<TaskLifecycle>,
        tasks: Arc<dyn TaskRepository>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            lifecycle,
            tasks,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the loop after the current iteration.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the sweep loop and serve armed per-task timers until shut down.
    pub async fn run(self, mut expiries: mpsc::UnboundedReceiver<Expiry>) {
        if self.config.run_startup_purge {
            match self.purge_stale_creating().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "removed orphaned creating tasks"),
                Err(e) => warn!(error = %e, "startup purge failed"),
            }
        }

        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut consecutive_failures: u32 = 0;
        let mut expiries_open = true;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("reaper shutting down");
                return;
            }
            tokio::select! {
                _ = ticker.tick() => match self.sweep().await {
                    Ok(killed) => {
                        consecutive_failures = 0;
                        if killed > 0 {
                            info!(killed, "sweep reaped expired tasks");
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(error = %e, consecutive_failures, "sweep failed");
                        if consecutive_failures >= self.config.max_consecutive_failures {
                            error!("too many consecutive sweep failures, stopping reaper");
                            return;
                        }
                    }
                },
                expiry = expiries.recv(), if expiries_open => match expiry {
                    Some(expiry) => self.spawn_timer(expiry),
                    None => expiries_open = false,
                },
            }
        }
    }

    fn spawn_timer(&self, expiry: Expiry) {
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            let now = Utc::now();
            if expiry.deadline > now {
                let wait = (expiry.deadline - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
            }
            if let Err(e) = lifecycle.kill_task(&expiry.task).await {
                warn!(task = %expiry.task, error = %e, "timer kill failed, sweep will retry");
            }
        });
    }

    /// One pass over expired active tasks. Per-task kill failures are
    /// logged and skipped so one stuck instance cannot stall the rest.
    pub async fn sweep(&self) -> SchedResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.expiry_slack.as_secs() as i64);
        let expired = self.tasks.expired_active(cutoff).await?;
        let mut killed = 0;
        for task in expired {
            match self.lifecycle.kill_task(&task.name).await {
                Ok(()) => killed += 1,
                Err(e) => warn!(task = %task.name, error = %e, "sweep kill failed"),
            }
        }
        Ok(killed)
    }

    /// Delete `creating` rows whose provisioning never completed within
    /// the grace interval.
    pub async fn purge_stale_creating(&self) -> SchedResult<usize> {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.config.creating_grace.as_secs() as i64);
        let stale = self.tasks.stale_creating(cutoff).await?;
        let mut purged = 0;
        for task in stale {
            warn!(task = %task.name, "purging orphaned creating task");
            self.tasks.delete(&task.name).await?;
            purged += 1;
        }
        Ok(purged)
    }
}
