//! Adapters: concrete implementations of the domain ports.

pub mod lxd;
pub mod sqlite;
