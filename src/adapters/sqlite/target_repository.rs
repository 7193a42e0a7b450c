//! SQLite implementation of the `TargetRepository`.
//!
//! Claim, release and rebind are the mutual-exclusion primitives of the
//! whole scheduler; each is a single versioned UPDATE so that exactly one
//! of any set of concurrent claimants can win.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::{Target, TargetDescriptor, TargetStatus};
use crate::domain::ports::TargetRepository;

#[derive(Clone)]
pub struct SqliteTargetRepository {
    pool: SqlitePool,
}

impl SqliteTargetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, instance_type, descriptor, status, instance, task, version";

fn row_to_target(row: &sqlx::sqlite::SqliteRow) -> SchedResult<Target> {
    let status_raw: String = row.try_get("status")?;
    let descriptor_raw: String = row.try_get("descriptor")?;
    let descriptor: TargetDescriptor = serde_json::from_str(&descriptor_raw)?;
    Ok(Target {
        id: row.try_get("id")?,
        instance_type: row.try_get("instance_type")?,
        descriptor,
        status: TargetStatus::parse(&status_raw)
            .ok_or_else(|| SchedError::Database(format!("unknown target status {status_raw:?}")))?,
        instance: row.try_get("instance")?,
        task: row.try_get("task")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl TargetRepository for SqliteTargetRepository {
    async fn get(&self, id: i64) -> SchedResult<Option<Target>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM targets WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_target).transpose()
    }

    async fn first_idle(&self, instance_type: &str) -> SchedResult<Option<Target>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM targets
             WHERE instance_type = ? AND status = 'idle'
             ORDER BY id ASC LIMIT 1"
        ))
        .bind(instance_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_target).transpose()
    }

    async fn any_for_type(&self, instance_type: &str) -> SchedResult<Option<Target>> {
        // 'idle' sorts after 'busy', so DESC prefers an idle template.
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM targets
             WHERE instance_type = ?
             ORDER BY status DESC, id ASC LIMIT 1"
        ))
        .bind(instance_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_target).transpose()
    }

    async fn exists_idle(&self, instance_type: &str) -> SchedResult<bool> {
        let row =
            sqlx::query("SELECT 1 FROM targets WHERE instance_type = ? AND status = 'idle' LIMIT 1")
                .bind(instance_type)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn claim(&self, target: &Target, task: &str, instance: &str) -> SchedResult<bool> {
        let result = sqlx::query(
            "UPDATE targets SET status = 'busy', instance = ?, task = ?, version = version + 1
             WHERE id = ? AND version = ? AND status = 'idle'",
        )
        .bind(instance)
        .bind(task)
        .bind(target.id)
        .bind(target.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, target: &Target) -> SchedResult<bool> {
        let result = sqlx::query(
            "UPDATE targets SET status = 'idle', instance = '', task = '', version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(target.id)
        .bind(target.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rebind(&self, target: &Target, task: &str, instance: &str) -> SchedResult<bool> {
        let result = sqlx::query(
            "UPDATE targets SET instance = ?, task = ?, version = version + 1
             WHERE id = ? AND version = ? AND status = 'busy'",
        )
        .bind(instance)
        .bind(task)
        .bind(target.id)
        .bind(target.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_type(&self, instance_type: &str) -> SchedResult<Vec<Target>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM targets WHERE instance_type = ? ORDER BY id ASC"
        ))
        .bind(instance_type)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_target).collect()
    }
}
