//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default semantic-retry budget per step.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default hard bound on reasoner entries per step.
pub const DEFAULT_STEP_LOOP_BUDGET: u32 = 12;

/// Tunables of one engine instance.
///
/// ```rust
/// use subquest_core::EngineConfig;
///
/// let config = EngineConfig::default().with_max_retries(3);
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Semantic-retry budget per step: how many times a step may be
    /// restarted after a negative validation verdict.
    pub max_retries: u32,

    /// Hard bound on reasoner entries per step. Guarantees progress even
    /// if a reasoner keeps toggling flags; exceeding it fails the step
    /// with `loop_budget_exhausted`.
    pub step_loop_budget: u32,

    /// Optional wall-clock deadline for one invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step_loop_budget: DEFAULT_STEP_LOOP_BUDGET,
            deadline: None,
        }
    }
}

impl EngineConfig {
    /// Override the semantic-retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the per-step loop bound.
    pub fn with_step_loop_budget(mut self, budget: u32) -> Self {
        self.step_loop_budget = budget;
        self
    }

    /// Set the per-invocation deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.step_loop_budget, 12);
        assert!(config.deadline.is_none());
    }
}
