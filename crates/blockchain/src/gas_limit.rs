//! Gas-limit adjustment policy.

use serde::{Deserialize, Serialize};

/// Bounds for per-block gas-limit movement. With no target configured the
/// parent's limit is inherited unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GasLimitPolicy {
    pub target: Option<u64>,
    pub min: u64,
    pub max: u64,
}

impl Default for GasLimitPolicy {
    fn default() -> Self {
        Self { target: None, min: 5_000, max: u64::MAX }
    }
}

impl GasLimitPolicy {
    /// Next block's gas limit given the parent's. Movement toward the
    /// target is bounded to parent/1024 per block and the result is
    /// clamped into [min, max].
    pub fn next(&self, parent_gas_limit: u64) -> u64 {
        let Some(target) = self.target else { return parent_gas_limit };

        let step = parent_gas_limit / 1024;
        let next = if target > parent_gas_limit {
            parent_gas_limit.saturating_add(step.min(target - parent_gas_limit))
        } else {
            parent_gas_limit.saturating_sub(step.min(parent_gas_limit - target))
        };

        next.clamp(self.min, self.max)
    }
}
