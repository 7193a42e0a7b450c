//! Queue entry model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One waiting task in an instance type's FIFO.
///
/// `instance_type` and `lifetime` are denormalized from the activation
/// request so promotion and estimation never join back to the task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub user: String,
    /// Name of the queued task.
    pub task: String,
    pub instance_type: String,
    /// Requested lifetime, charged at enqueue time.
    pub lifetime: Duration,
    pub creation: DateTime<Utc>,
}
