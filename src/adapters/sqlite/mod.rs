//! SQLite persistence adapters.
//!
//! One repository per relation, all over a shared `SqlitePool`. Mutable
//! rows carry a `version` column; updates are compare-and-swaps on it, and
//! `rows_affected() == 0` is reported to the caller rather than retried.

pub mod connection;
pub mod instance_type_repository;
pub mod migrations;
pub mod queue_repository;
pub mod target_repository;
pub mod task_repository;
pub mod user_repository;

pub use connection::{create_pool, create_test_pool, PoolConfig};
pub use instance_type_repository::SqliteInstanceTypeRepository;
pub use migrations::{all_embedded_migrations, Migration, Migrator};
pub use queue_repository::SqliteQueueRepository;
pub use target_repository::SqliteTargetRepository;
pub use task_repository::SqliteTaskRepository;
pub use user_repository::SqliteUserRepository;

use chrono::{DateTime, Utc};

use crate::domain::errors::{SchedError, SchedResult};

/// Parse an RFC 3339 column value.
pub(crate) fn parse_timestamp(raw: &str) -> SchedResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SchedError::Database(format!("invalid timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_optional_timestamp(raw: Option<&str>) -> SchedResult<Option<DateTime<Utc>>> {
    raw.map(parse_timestamp).transpose()
}
