//! Services: the scheduling and lifecycle engine.

pub mod admin;
pub mod billing;
pub mod estimator;
pub mod lifecycle;
pub mod placement;
pub mod queue_engine;
pub mod reaper;
pub mod spec_render;
pub mod target_pool;

pub use admin::AdminService;
pub use billing::BillingGate;
pub use estimator::QueueTimeEstimator;
pub use lifecycle::{Activation, TaskLifecycle};
pub use placement::{Placement, PlacementOutcome};
pub use queue_engine::QueueEngine;
pub use reaper::{expiry_channel, Expiry, ExpiryHandle, Reaper, ReaperConfig};
pub use spec_render::render_spec;
pub use target_pool::TargetPool;
