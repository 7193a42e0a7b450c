//! Hypervisor port: the contract the scheduling engine holds against the
//! external instance hypervisor.
//!
//! Every mutating operation follows the submit-and-await discipline: the
//! adapter submits the request, blocks on the resulting operation and maps
//! the outcome onto the `HypervisorError` classes. Awaits may take seconds
//! to minutes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::HypervisorError;
use crate::domain::models::TargetDescriptor;

/// Parsed form of an instance type's configure blob.
///
/// Only `name` is interpreted by the core; everything else is carried
/// opaquely from the YAML blob to the hypervisor request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(flatten)]
    pub body: BTreeMap<String, serde_json::Value>,
}

/// Power action for `update_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceAction {
    Start,
    Stop,
    Restart,
}

impl InstanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

/// Point-in-time resource state of an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceState {
    pub name: String,
    pub status: String,
    /// CPU usage in nanoseconds.
    pub cpu_usage: i64,
    /// Memory usage in bytes.
    pub memory_usage: i64,
}

/// Asynchronous instance operations, already awaited to completion.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// Create the instance on the target's cluster member.
    async fn create_instance(
        &self,
        name: &str,
        spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError>;

    /// Bring the instance up on the target, live-migrating it from another
    /// member first when necessary and preserving host-volatile config
    /// keys across the move.
    async fn start_instance(
        &self,
        name: &str,
        spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError>;

    /// Change the power state. A stop of a stopped instance yields
    /// `HypervisorError::AlreadyStopped`; a stateful stop on a host
    /// without support yields `HypervisorError::StatefulUnsupported`.
    async fn update_state(
        &self,
        name: &str,
        action: InstanceAction,
        force: bool,
        stateful: bool,
    ) -> Result<(), HypervisorError>;

    async fn delete_instance(&self, name: &str) -> Result<(), HypervisorError>;

    async fn instance_state(&self, name: &str) -> Result<InstanceState, HypervisorError>;
}
