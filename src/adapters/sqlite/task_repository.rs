//! SQLite implementation of the `TaskRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::{parse_optional_timestamp, parse_timestamp};
use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::TaskRepository;

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str =
    "name, user, instance_type, status, creation, queue_time, end_time, target_id, instance, version";

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> SchedResult<Task> {
    let status_raw: String = row.try_get("status")?;
    let creation_raw: String = row.try_get("creation")?;
    let queue_time_raw: Option<String> = row.try_get("queue_time")?;
    let end_time_raw: Option<String> = row.try_get("end_time")?;
    Ok(Task {
        name: row.try_get("name")?,
        user: row.try_get("user")?,
        instance_type: row.try_get("instance_type")?,
        status: TaskStatus::parse(&status_raw)
            .ok_or_else(|| SchedError::Database(format!("unknown task status {status_raw:?}")))?,
        creation: parse_timestamp(&creation_raw)?,
        queue_time: parse_optional_timestamp(queue_time_raw.as_deref())?,
        end_time: parse_optional_timestamp(end_time_raw.as_deref())?,
        target_id: row.try_get("target_id")?,
        instance: row.try_get("instance")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn get(&self, name: &str) -> SchedResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn exists(&self, name: &str) -> SchedResult<bool> {
        let row = sqlx::query("SELECT 1 FROM tasks WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, task: &Task) -> SchedResult<()> {
        sqlx::query(
            "INSERT INTO tasks
                 (name, user, instance_type, status, creation, queue_time, end_time,
                  target_id, instance, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.name)
        .bind(&task.user)
        .bind(&task.instance_type)
        .bind(task.status.as_str())
        .bind(task.creation.to_rfc3339())
        .bind(task.queue_time.map(|t| t.to_rfc3339()))
        .bind(task.end_time.map(|t| t.to_rfc3339()))
        .bind(task.target_id)
        .bind(&task.instance)
        .bind(task.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, task: &Task) -> SchedResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET
                 user = ?, instance_type = ?, status = ?, queue_time = ?, end_time = ?,
                 target_id = ?, instance = ?, version = version + 1
             WHERE name = ? AND version = ?",
        )
        .bind(&task.user)
        .bind(&task.instance_type)
        .bind(task.status.as_str())
        .bind(task.queue_time.map(|t| t.to_rfc3339()))
        .bind(task.end_time.map(|t| t.to_rfc3339()))
        .bind(task.target_id)
        .bind(&task.instance)
        .bind(&task.name)
        .bind(task.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, name: &str) -> SchedResult<()> {
        sqlx::query("DELETE FROM tasks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_user(&self, user: &str) -> SchedResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE user = ? ORDER BY creation ASC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }

    async fn expired_active(&self, cutoff: DateTime<Utc>) -> SchedResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE status = 'active' AND end_time < ?
             ORDER BY end_time ASC"
        ))
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }

    async fn stale_creating(&self, cutoff: DateTime<Utc>) -> SchedResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE status = 'creating' AND creation < ?"
        ))
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }

    async fn latest_ending_active(&self, instance_type: &str) -> SchedResult<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE instance_type = ? AND status = 'active'
             ORDER BY end_time DESC LIMIT 1"
        ))
        .bind(instance_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_task).transpose()
    }
}
