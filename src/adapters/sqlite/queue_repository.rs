//! SQLite implementation of the `QueueRepository`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::parse_timestamp;
use crate::domain::errors::SchedResult;
use crate::domain::models::QueueEntry;
use crate::domain::ports::QueueRepository;

#[derive(Clone)]
pub struct SqliteQueueRepository {
    pool: SqlitePool,
}

impl SqliteQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> SchedResult<QueueEntry> {
    let creation_raw: String = row.try_get("creation")?;
    let lifetime_secs: i64 = row.try_get("lifetime_secs")?;
    Ok(QueueEntry {
        id: row.try_get("id")?,
        user: row.try_get("user")?,
        task: row.try_get("task")?,
        instance_type: row.try_get("instance_type")?,
        lifetime: Duration::from_secs(lifetime_secs.max(0) as u64),
        creation: parse_timestamp(&creation_raw)?,
    })
}

const COLUMNS: &str = "id, user, task, instance_type, lifetime_secs, creation";

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn insert(&self, entry: &QueueEntry) -> SchedResult<i64> {
        let result = sqlx::query(
            "INSERT INTO queue (user, task, instance_type, lifetime_secs, creation)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.user)
        .bind(&entry.task)
        .bind(&entry.instance_type)
        .bind(entry.lifetime.as_secs() as i64)
        .bind(entry.creation.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn head(&self, instance_type: &str) -> SchedResult<Option<QueueEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM queue
             WHERE instance_type = ?
             ORDER BY creation ASC, id ASC LIMIT 1"
        ))
        .bind(instance_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_entry).transpose()
    }

    async fn delete(&self, id: i64) -> SchedResult<bool> {
        let result = sqlx::query("DELETE FROM queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_task(&self, task: &str) -> SchedResult<u64> {
        let result = sqlx::query("DELETE FROM queue WHERE task = ?")
            .bind(task)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn entries_before(
        &self,
        instance_type: &str,
        at: DateTime<Utc>,
    ) -> SchedResult<Vec<QueueEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM queue
             WHERE instance_type = ? AND creation < ?
             ORDER BY creation ASC, id ASC"
        ))
        .bind(instance_type)
        .bind(at.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn count_for_task(&self, task: &str) -> SchedResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue WHERE task = ?")
            .bind(task)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
