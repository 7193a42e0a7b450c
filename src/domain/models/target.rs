//! Target model: a pre-allocated placement slot for one instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Occupancy status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Idle,
    Busy,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }
}

/// Opaque placement parameterization produced by the renderer.
///
/// `target` names the cluster member the instance lands on; `data` carries
/// free-form values the renderer substitutes into instance config. The core
/// never interprets `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

/// A slot of an instance type's pool onto which at most one task is placed.
///
/// `status`, `instance` and `task` move together: a busy target names both
/// the occupying instance and task, an idle target names neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub instance_type: String,
    pub descriptor: TargetDescriptor,
    pub status: TargetStatus,
    pub instance: String,
    pub task: String,
    pub version: i64,
}

impl Target {
    pub fn is_idle(&self) -> bool {
        self.status == TargetStatus::Idle
    }
}
