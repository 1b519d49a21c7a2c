//! Budget configuration
//!
//! Per-command ledger limits plus the per-user daily quotas the
//! orchestrator checks at request entry.

use std::time::Duration;

use newsloom_core::budget::BudgetLimits;
use serde::{Deserialize, Serialize};

/// Budget limits configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    /// Token ceiling for one command
    pub max_tokens_per_command: u64,
    /// Cost ceiling for one command, in cents
    pub max_cost_cents_per_command: f64,
    /// Wall-clock ceiling for one command, in seconds
    pub max_duration_sec: u64,
    /// Commands a single user may run per day
    pub max_commands_per_user_daily: u32,
    /// Cents a single user may spend per day
    pub max_cost_cents_per_user_daily: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_command: 60_000,
            max_cost_cents_per_command: 50.0,
            max_duration_sec: 45,
            max_commands_per_user_daily: 200,
            max_cost_cents_per_user_daily: 500.0,
        }
    }
}

impl BudgetConfig {
    /// Ledger limits for one request
    #[must_use]
    pub fn per_command_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_tokens: self.max_tokens_per_command,
            max_cost_cents: self.max_cost_cents_per_command,
            max_duration: Duration::from_secs(self.max_duration_sec),
        }
    }
}
