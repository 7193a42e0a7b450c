//! User account model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Banned,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Banned => "banned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            "banned" => Some(Self::Banned),
            _ => None,
        }
    }
}

/// Per-currency credit balances, e.g. `{"credit": 100}`.
pub type Balance = BTreeMap<String, i64>;

/// A user account with prepaid balances.
///
/// Balances are mutated only by the billing gate (debits) and by admin
/// writes; `version` backs the optimistic compare-and-swap on updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
    pub balance: Balance,
    pub version: i64,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            balance: Balance::new(),
            version: 0,
        }
    }
}
