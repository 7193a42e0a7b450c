//! Runtime configuration model.

use serde::{Deserialize, Serialize};

/// Top-level configuration, merged from defaults, a YAML file and
/// `VMSCHED_`-prefixed environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub hypervisor: HypervisorConfig,
    pub scheduler: SchedulerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/vmsched/vmsched.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HypervisorConfig {
    /// Base URL of the hypervisor REST endpoint.
    pub endpoint: String,
    /// Verify the endpoint's TLS certificate.
    pub verify_tls: bool,
    /// PEM client certificate + key for mutual TLS, if required.
    pub client_pem: Option<String>,
    /// Seconds to wait for one operation to complete.
    pub operation_timeout_secs: u64,
}

impl Default for HypervisorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://127.0.0.1:8443".to_string(),
            verify_tls: false,
            client_pem: None,
            operation_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between expiry sweeps, in seconds.
    pub cron_interval_secs: u64,
    /// Slack subtracted from now when sweeping, to avoid racing in-process
    /// timers that are about to fire.
    pub expiry_slack_secs: u64,
    /// Age after which a task still in `creating` is considered orphaned.
    pub creating_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron_interval_secs: 60,
            expiry_slack_secs: 30,
            creating_grace_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error.
    pub level: String,
    /// pretty or json.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}
