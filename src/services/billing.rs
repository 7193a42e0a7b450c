//! Billing gate: the only mutator of user balances.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::Price;
use crate::domain::ports::UserRepository;

pub struct BillingGate {
    users: Arc<dyn UserRepository>,
}

/// Cost per currency for a lifetime, at integer-minute granularity.
pub fn cost_for(price: &Price, lifetime: Duration) -> Price {
    let minutes = (lifetime.as_secs() / 60) as i64;
    price.iter().map(|(k, v)| (k.clone(), v * minutes)).collect()
}

impl BillingGate {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Debit the user for `lifetime` at `price`.
    ///
    /// Either every currency is charged in one versioned write or nothing
    /// is: insufficient funds in any currency reject the whole charge, and
    /// a version miss on the write surfaces as `ConcurrentWrite` with the
    /// balance untouched.
    pub async fn charge(&self, user_name: &str, price: &Price, lifetime: Duration) -> SchedResult<()> {
        let mut user = self
            .users
            .get(user_name)
            .await?
            .ok_or_else(|| SchedError::UserNotFound(user_name.to_string()))?;

        for (currency, cost) in cost_for(price, lifetime) {
            match user.balance.get_mut(&currency) {
                Some(balance) if *balance >= cost => *balance -= cost,
                _ => {
                    return Err(SchedError::BalanceLow { currency });
                }
            }
        }

        if !self.users.update_balance(&user).await? {
            return Err(SchedError::ConcurrentWrite {
                entity: "user",
                key: user_name.to_string(),
            });
        }
        info!(user = user_name, lifetime_secs = lifetime.as_secs(), "charged activation");
        Ok(())
    }
}
