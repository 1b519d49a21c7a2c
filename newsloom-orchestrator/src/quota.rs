//! Per-user daily quotas
//!
//! Process-wide command and spend counters keyed by user and calendar
//! day. Checked at request entry; cost is settled after the request so
//! a request in flight cannot be double-charged.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use newsloom_core::{NewsloomError, Result};
use tracing::debug;

/// Daily usage tracker
pub struct QuotaTracker {
    max_commands: u32,
    max_cost_cents: f64,
    usage: DashMap<(String, NaiveDate), (u32, f64)>,
}

impl QuotaTracker {
    /// Tracker with the configured daily caps
    #[must_use]
    pub fn new(max_commands: u32, max_cost_cents: f64) -> Self {
        Self {
            max_commands,
            max_cost_cents,
            usage: DashMap::new(),
        }
    }

    /// Admit a command for the user today, counting it
    ///
    /// Anonymous requests (no user id) are not quota-tracked.
    ///
    /// # Errors
    /// Returns a budget error when either daily cap is exhausted.
    pub fn admit(&self, user_id: Option<&str>) -> Result<()> {
        let Some(user) = user_id else { return Ok(()) };
        let key = (user.to_string(), Utc::now().date_naive());
        let mut entry = self.usage.entry(key).or_insert((0, 0.0));
        let (count, cents) = *entry;
        if count >= self.max_commands {
            return Err(NewsloomError::budget_exceeded(format!(
                "user {user} exhausted the daily command quota ({})",
                self.max_commands
            )));
        }
        if cents >= self.max_cost_cents {
            return Err(NewsloomError::budget_exceeded(format!(
                "user {user} exhausted the daily cost quota ({} cents)",
                self.max_cost_cents
            )));
        }
        entry.0 = count + 1;
        debug!(user, commands_today = entry.0, "command admitted");
        Ok(())
    }

    /// Settle the actual cost of a finished request
    pub fn settle(&self, user_id: Option<&str>, cost_cents: f64) {
        let Some(user) = user_id else { return };
        let key = (user.to_string(), Utc::now().date_naive());
        let mut entry = self.usage.entry(key).or_insert((0, 0.0));
        entry.1 += cost_cents;
    }
}
