//! User repository port.

use async_trait::async_trait;

use crate::domain::errors::SchedResult;
use crate::domain::models::User;

/// Persistence for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, name: &str) -> SchedResult<Option<User>>;

    /// Insert or fully replace role and balance; resets nothing else.
    async fn upsert(&self, user: &User) -> SchedResult<()>;

    /// Write the balance under optimistic version check.
    ///
    /// Returns `Ok(false)` when the row moved since `user` was read
    /// (affected-rows = 0); the caller decides whether that is fatal.
    async fn update_balance(&self, user: &User) -> SchedResult<bool>;

    /// Whether any user with the given role exists.
    async fn any_with_role(&self, role: &str) -> SchedResult<bool>;
}
