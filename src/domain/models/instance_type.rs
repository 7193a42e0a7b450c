//! Instance type model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Credits per minute, keyed by currency tag.
pub type Price = BTreeMap<String, i64>;

/// A named class of instances with a fixed target pool and a price.
///
/// `configure` is an opaque YAML blob consumed by the instance renderer;
/// the core only checks that it parses (see `services::spec_render`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    pub description: String,
    pub configure: String,
    pub price: Price,
}
