//! Configuration loading: YAML file plus environment overrides, merged
//! over programmatic defaults and validated after extraction.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
