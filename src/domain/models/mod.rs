//! Domain models.

pub mod config;
pub mod instance_type;
pub mod queue;
pub mod target;
pub mod task;
pub mod user;

pub use config::{Config, DatabaseConfig, HypervisorConfig, LogConfig, LogFormat, SchedulerConfig};
pub use instance_type::{InstanceType, Price};
pub use queue::QueueEntry;
pub use target::{Target, TargetDescriptor, TargetStatus};
pub use task::{Task, TaskStatus};
pub use user::{Balance, Role, User};
