//! vmsched - multi-tenant scheduler and lifecycle controller for
//! hypervisor-backed workloads.
//!
//! Users submit tasks requesting a named instance type; the engine
//! provisions instances, charges prepaid credits for a requested
//! lifetime, places tasks on a fixed pool of per-type targets or queues
//! them FIFO, terminates tasks at expiry and promotes the next queued
//! task onto the freed target. Coordination is optimistic: every mutable
//! row is versioned and racing actors resolve through compare-and-swap
//! writes, never process-wide locks.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{HypervisorError, SchedError, SchedResult};
pub use domain::models::{Config, InstanceType, QueueEntry, Target, Task, TaskStatus, User};
pub use services::{Activation, TaskLifecycle};
