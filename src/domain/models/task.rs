//! Task domain model.
//!
//! A task is one user-submitted workload: a provisioned instance plus the
//! lifecycle state that decides whether it currently occupies a target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Row inserted, instance provisioning in flight.
    Creating,
    /// Instance exists but is not running; the resting state.
    Inactive,
    /// Charged and waiting for a free target.
    Queued,
    /// Running on a target until `end_time`.
    Active,
    /// Stop requested, instance shutdown in flight.
    Terminating,
    /// Instance deletion in flight; the row goes away next.
    Deleting,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Inactive => "inactive",
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Terminating => "terminating",
            Self::Deleting => "deleting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creating" => Some(Self::Creating),
            "inactive" => Some(Self::Inactive),
            "queued" => Some(Self::Queued),
            "active" => Some(Self::Active),
            "terminating" => Some(Self::Terminating),
            "deleting" => Some(Self::Deleting),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Creating => &[Self::Inactive],
            Self::Inactive => &[Self::Queued, Self::Deleting],
            Self::Queued => &[Self::Active],
            Self::Active => &[Self::Terminating],
            Self::Terminating => &[Self::Inactive],
            Self::Deleting => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Whether the task currently occupies a target.
    pub fn occupies_target(&self) -> bool {
        matches!(self, Self::Active | Self::Terminating)
    }
}

/// A scheduled workload owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique, user-chosen name.
    pub name: String,
    /// Owning user.
    pub user: String,
    /// Requested instance type.
    pub instance_type: String,
    pub status: TaskStatus,
    pub creation: DateTime<Utc>,
    /// Set when the task transitioned to `queued`.
    pub queue_time: Option<DateTime<Utc>>,
    /// Prepaid deadline; set at activation.
    pub end_time: Option<DateTime<Utc>>,
    /// Occupied target; meaningful only while `status.occupies_target()`.
    pub target_id: Option<i64>,
    /// Generated instance name, stable for the task's life.
    pub instance: String,
    pub version: i64,
}
