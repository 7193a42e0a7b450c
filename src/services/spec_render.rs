//! Configure-blob validation.
//!
//! An instance type's `configure` is an opaque YAML document owned by the
//! external renderer. The core only needs to know that it parses into an
//! instance spec before touching the hypervisor; everything inside stays
//! uninterpreted.

use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::ports::InstanceSpec;

/// Parse a configure blob, rejecting anything that is not a YAML mapping.
pub fn render_spec(configure: &str) -> SchedResult<InstanceSpec> {
    if configure.trim().is_empty() {
        return Err(SchedError::Render("configure is empty".to_string()));
    }
    serde_yaml::from_str(configure).map_err(|e| SchedError::Render(e.to_string()))
}
