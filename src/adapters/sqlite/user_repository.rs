//! SQLite implementation of the `UserRepository`.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::{Balance, Role, User};
use crate::domain::ports::UserRepository;

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> SchedResult<User> {
    let role_raw: String = row.try_get("role")?;
    let balance_raw: String = row.try_get("balance")?;
    let balance: Balance = serde_json::from_str(&balance_raw)?;
    Ok(User {
        name: row.try_get("name")?,
        role: Role::parse(&role_raw)
            .ok_or_else(|| SchedError::Database(format!("unknown role {role_raw:?}")))?,
        balance,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get(&self, name: &str) -> SchedResult<Option<User>> {
        let row = sqlx::query("SELECT name, role, balance, version FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn upsert(&self, user: &User) -> SchedResult<()> {
        let balance_json = serde_json::to_string(&user.balance)?;
        sqlx::query(
            "INSERT INTO users (name, role, balance, version) VALUES (?, ?, ?, 0)
             ON CONFLICT(name) DO UPDATE SET
                 role = excluded.role,
                 balance = excluded.balance,
                 version = users.version + 1",
        )
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&balance_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_balance(&self, user: &User) -> SchedResult<bool> {
        let balance_json = serde_json::to_string(&user.balance)?;
        let result = sqlx::query(
            "UPDATE users SET balance = ?, version = version + 1
             WHERE name = ? AND version = ?",
        )
        .bind(&balance_json)
        .bind(&user.name)
        .bind(user.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn any_with_role(&self, role: &str) -> SchedResult<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE role = ? LIMIT 1")
            .bind(role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
