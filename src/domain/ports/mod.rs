//! Ports: async traits the services are written against.

pub mod hypervisor;
pub mod instance_type_repository;
pub mod queue_repository;
pub mod target_repository;
pub mod task_repository;
pub mod user_repository;

pub use hypervisor::{Hypervisor, InstanceAction, InstanceSpec, InstanceState};
pub use instance_type_repository::InstanceTypeRepository;
pub use queue_repository::QueueRepository;
pub use target_repository::TargetRepository;
pub use task_repository::TaskRepository;
pub use user_repository::UserRepository;
