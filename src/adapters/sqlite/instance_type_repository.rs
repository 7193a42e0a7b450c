//! SQLite implementation of the `InstanceTypeRepository`.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::SchedResult;
use crate::domain::models::{InstanceType, Price, TargetDescriptor};
use crate::domain::ports::InstanceTypeRepository;

#[derive(Clone)]
pub struct SqliteInstanceTypeRepository {
    pool: SqlitePool,
}

impl SqliteInstanceTypeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_type(row: &sqlx::sqlite::SqliteRow) -> SchedResult<InstanceType> {
    let price_raw: String = row.try_get("price")?;
    let price: Price = serde_json::from_str(&price_raw)?;
    Ok(InstanceType {
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        configure: row.try_get("configure")?,
        price,
    })
}

#[async_trait]
impl InstanceTypeRepository for SqliteInstanceTypeRepository {
    async fn get(&self, name: &str) -> SchedResult<Option<InstanceType>> {
        let row = sqlx::query(
            "SELECT name, description, configure, price FROM instance_types WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_type).transpose()
    }

    async fn list(&self) -> SchedResult<Vec<InstanceType>> {
        let rows = sqlx::query(
            "SELECT name, description, configure, price FROM instance_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_type).collect()
    }

    async fn replace_with_targets(
        &self,
        instance_type: &InstanceType,
        targets: &[TargetDescriptor],
    ) -> SchedResult<()> {
        let price_json = serde_json::to_string(&instance_type.price)?;
        let descriptors: Vec<String> = targets
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<_, _>>()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO instance_types (name, description, configure, price)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                 description = excluded.description,
                 configure = excluded.configure,
                 price = excluded.price",
        )
        .bind(&instance_type.name)
        .bind(&instance_type.description)
        .bind(&instance_type.configure)
        .bind(&price_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM targets WHERE instance_type = ?")
            .bind(&instance_type.name)
            .execute(&mut *tx)
            .await?;

        for descriptor in &descriptors {
            sqlx::query(
                "INSERT INTO targets (instance_type, descriptor, status, instance, task, version)
                 VALUES (?, ?, 'idle', '', '', 0)",
            )
            .bind(&instance_type.name)
            .bind(descriptor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cascade(&self, name: &str) -> SchedResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM instance_types WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM targets WHERE instance_type = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
