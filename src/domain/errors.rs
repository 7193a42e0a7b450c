//! Domain errors for the vmsched scheduling engine.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by scheduling and lifecycle operations.
#[derive(Debug, Error)]
pub enum SchedError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("instance type not found: {0}")]
    InstanceTypeNotFound(String),

    #[error("task already exists: {0}")]
    TaskAlreadyExists(String),

    #[error("task {task} is {status}, expected {expected}")]
    WrongState {
        task: String,
        status: String,
        expected: &'static str,
    },

    #[error("lifetime too short: {0:?}, minimum is one minute")]
    LifetimeTooShort(Duration),

    #[error("balance too low: currency {currency}")]
    BalanceLow { currency: String },

    #[error("probable concurrent write on {entity} {key}")]
    ConcurrentWrite { entity: &'static str, key: String },

    #[error("no targets defined for instance type {0}")]
    NoTarget(String),

    #[error("invalid instance configure: {0}")]
    Render(String),

    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type SchedResult<T> = Result<T, SchedError>;

impl From<sqlx::Error> for SchedError {
    fn from(err: sqlx::Error) -> Self {
        SchedError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SchedError {
    fn from(err: serde_json::Error) -> Self {
        SchedError::Serialization(err.to_string())
    }
}

/// Classified failures of asynchronous hypervisor operations.
///
/// Callers rely on the classes: `Transient` is safe to retry,
/// `AlreadyStopped` is success for an idempotent stop,
/// `StatefulUnsupported` must be downgraded to a force stop,
/// everything else is final.
#[derive(Debug, Error)]
pub enum HypervisorError {
    #[error("transient hypervisor failure: {0}")]
    Transient(String),

    #[error("instance already stopped")]
    AlreadyStopped,

    #[error("stateful stop unsupported: {0}")]
    StatefulUnsupported(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("hypervisor request failed: {0}")]
    Fatal(String),
}

impl HypervisorError {
    /// Whether a stop that failed with this error left the instance stopped
    /// anyway.
    pub fn is_already_stopped(&self) -> bool {
        matches!(self, HypervisorError::AlreadyStopped)
    }
}
