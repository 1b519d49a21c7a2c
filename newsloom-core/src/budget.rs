//! Per-request budget ledger
//!
//! Tracks tokens, monetary cost, and elapsed time for one request. The
//! ledger never fails: exceeding a limit is a signal for the caller to
//! degrade or abort. `record` and `can_afford` take a consistent snapshot
//! under one lock so concurrent agent tasks observe coherent totals.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::types::CommandKind;

/// Hard limits a ledger is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetLimits {
    pub max_tokens: u64,
    pub max_cost_cents: f64,
    pub max_duration: Duration,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_tokens: 60_000,
            max_cost_cents: 50.0,
            max_duration: Duration::from_secs(45),
        }
    }
}

/// Point-in-time view of ledger totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSnapshot {
    pub tokens_used: u64,
    pub cost_cents_used: f64,
    pub elapsed: Duration,
    pub calls: u32,
}

#[derive(Debug, Default)]
struct LedgerState {
    tokens_used: u64,
    cost_cents_used: f64,
    calls: u32,
    total_call_latency: Duration,
    warnings: Vec<String>,
}

/// Degradation severity derived from the remaining-budget ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeLevel {
    /// ratio ≥ 0.5
    None,
    /// 0.3 ≤ ratio < 0.5
    Moderate,
    /// ratio < 0.3
    Aggressive,
}

/// Parameter relaxations for one command at the current budget level
///
/// `None` fields leave the requested parameter untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradePlan {
    pub level: DegradeLevel,
    /// Iteration cap override for iterative answering
    pub depth: Option<u8>,
    /// Whether the self-check pass may run
    pub self_check: bool,
    /// Whether reranking may run
    pub use_rerank: bool,
    /// Traversal hop cap override
    pub hop_limit: Option<u8>,
    pub max_nodes: Option<usize>,
    pub max_edges: Option<usize>,
    /// Retrieval size override
    pub k_final: Option<usize>,
    /// Skip alternative event interpretations
    pub skip_alternatives: bool,
    /// Restrict memory operations to recall
    pub recall_only: bool,
}

impl DegradePlan {
    const fn unchanged(level: DegradeLevel) -> Self {
        Self {
            level,
            depth: None,
            self_check: true,
            use_rerank: true,
            hop_limit: None,
            max_nodes: None,
            max_edges: None,
            k_final: None,
            skip_alternatives: false,
            recall_only: false,
        }
    }
}

/// Mutable per-request budget accumulator
///
/// Created at request entry, shared by every task of the request, and
/// discarded at response emission. Thread-safe; a single mutex guards
/// the accumulating state while the limits stay immutable.
#[derive(Debug)]
pub struct BudgetLedger {
    limits: BudgetLimits,
    started_at: Instant,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    /// Create a ledger with the given limits, starting the clock now
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            started_at: Instant::now(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Limits this ledger enforces
    #[must_use]
    pub const fn limits(&self) -> &BudgetLimits {
        &self.limits
    }

    /// True iff adding the estimates would stay within every limit and
    /// the request still has wall-clock time left
    #[must_use]
    pub fn can_afford(&self, estimated_tokens: u64, estimated_cost_cents: f64) -> bool {
        let state = self.state.lock();
        let within_tokens = state.tokens_used + estimated_tokens <= self.limits.max_tokens;
        let within_cost =
            state.cost_cents_used + estimated_cost_cents <= self.limits.max_cost_cents;
        let within_time = self.started_at.elapsed() < self.limits.max_duration;
        trace!(
            estimated_tokens,
            estimated_cost_cents,
            within_tokens,
            within_cost,
            within_time,
            "budget affordability check"
        );
        within_tokens && within_cost && within_time
    }

    /// Accumulate actual usage; never rejects
    pub fn record(&self, tokens: u64, cost_cents: f64, call_latency: Duration) {
        let mut state = self.state.lock();
        state.tokens_used += tokens;
        state.cost_cents_used += cost_cents;
        state.calls += 1;
        state.total_call_latency += call_latency;
        debug!(
            tokens,
            cost_cents,
            total_tokens = state.tokens_used,
            total_cost_cents = state.cost_cents_used,
            "recorded model call on ledger"
        );
    }

    /// Minimum remaining fraction across tokens, cost, and time, in [0, 1]
    #[must_use]
    pub fn remaining_ratio(&self) -> f64 {
        let state = self.state.lock();
        #[allow(clippy::cast_precision_loss)]
        let token_ratio = if self.limits.max_tokens == 0 {
            0.0
        } else {
            (self.limits.max_tokens.saturating_sub(state.tokens_used)) as f64
                / self.limits.max_tokens as f64
        };
        let cost_ratio = if self.limits.max_cost_cents <= 0.0 {
            0.0
        } else {
            ((self.limits.max_cost_cents - state.cost_cents_used) / self.limits.max_cost_cents)
                .max(0.0)
        };
        let time_ratio = if self.limits.max_duration.is_zero() {
            0.0
        } else {
            let remaining = self
                .limits
                .max_duration
                .saturating_sub(self.started_at.elapsed());
            remaining.as_secs_f64() / self.limits.max_duration.as_secs_f64()
        };
        token_ratio.min(cost_ratio).min(time_ratio).clamp(0.0, 1.0)
    }

    /// Current degradation severity
    #[must_use]
    pub fn degrade_level(&self) -> DegradeLevel {
        let ratio = self.remaining_ratio();
        if ratio >= 0.5 {
            DegradeLevel::None
        } else if ratio >= 0.3 {
            DegradeLevel::Moderate
        } else {
            DegradeLevel::Aggressive
        }
    }

    /// Deterministic degradation table keyed by command and ratio band
    #[must_use]
    pub fn degrade_plan(&self, command: CommandKind) -> DegradePlan {
        let level = self.degrade_level();
        let mut plan = DegradePlan::unchanged(level);
        match level {
            DegradeLevel::None => {}
            DegradeLevel::Moderate => match command {
                CommandKind::Ask => {
                    plan.self_check = false;
                    plan.depth = Some(2);
                }
                CommandKind::GraphQuery => {
                    plan.hop_limit = Some(2);
                    plan.max_nodes = Some(120);
                }
                _ => {}
            },
            DegradeLevel::Aggressive => match command {
                CommandKind::Ask => {
                    plan.depth = Some(1);
                    plan.self_check = false;
                    plan.use_rerank = false;
                }
                CommandKind::GraphQuery => {
                    plan.hop_limit = Some(1);
                    plan.max_nodes = Some(60);
                    plan.max_edges = Some(180);
                }
                CommandKind::EventsLink => {
                    plan.k_final = Some(5);
                    plan.skip_alternatives = true;
                }
                CommandKind::MemorySuggest
                | CommandKind::MemoryStore
                | CommandKind::MemoryRecall => {
                    plan.recall_only = true;
                }
                _ => {}
            },
        }
        debug!(command = %command, ?level, "computed degradation plan");
        plan
    }

    /// Append a warning tag surfaced on the final response
    pub fn add_warning(&self, tag: impl Into<String>) {
        let tag = tag.into();
        debug!(tag = %tag, "ledger warning added");
        self.state.lock().warnings.push(tag);
    }

    /// Accumulated warning tags, in insertion order
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.state.lock().warnings.clone()
    }

    /// Wall-clock time left before the request deadline
    #[must_use]
    pub fn remaining_duration(&self) -> Duration {
        self.limits
            .max_duration
            .saturating_sub(self.started_at.elapsed())
    }

    /// True once the request deadline has passed
    #[must_use]
    pub fn time_exhausted(&self) -> bool {
        self.remaining_duration().is_zero()
    }

    /// Consistent view of the accumulated totals
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let state = self.state.lock();
        BudgetSnapshot {
            tokens_used: state.tokens_used,
            cost_cents_used: state.cost_cents_used,
            elapsed: self.started_at.elapsed(),
            calls: state.calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(tokens: u64, cents: f64, secs: u64) -> BudgetLedger {
        BudgetLedger::new(BudgetLimits {
            max_tokens: tokens,
            max_cost_cents: cents,
            max_duration: Duration::from_secs(secs),
        })
    }

    #[test]
    fn test_fresh_ledger_affords_within_limits() {
        let l = ledger(1000, 10.0, 30);
        assert!(l.can_afford(1000, 10.0));
        assert!(!l.can_afford(1001, 0.0));
        assert!(!l.can_afford(0, 10.01));
    }

    #[test]
    fn test_record_accumulates_and_never_rejects() {
        let l = ledger(100, 1.0, 30);
        l.record(500, 5.0, Duration::from_millis(80));
        let snap = l.snapshot();
        assert_eq!(snap.tokens_used, 500);
        assert!((snap.cost_cents_used - 5.0).abs() < f64::EPSILON);
        assert_eq!(snap.calls, 1);
        assert!(!l.can_afford(1, 0.0));
    }

    #[test]
    fn test_remaining_ratio_is_min_dimension() {
        let l = ledger(1000, 100.0, 1000);
        l.record(900, 10.0, Duration::ZERO);
        // tokens at 0.1 remaining, cost at 0.9, time near 1.0
        let ratio = l.remaining_ratio();
        assert!(ratio <= 0.11, "ratio was {ratio}");
    }

    #[test]
    fn test_degrade_bands() {
        let l = ledger(1000, 100.0, 1000);
        assert_eq!(l.degrade_level(), DegradeLevel::None);
        l.record(600, 0.0, Duration::ZERO);
        assert_eq!(l.degrade_level(), DegradeLevel::Moderate);
        l.record(200, 0.0, Duration::ZERO);
        assert_eq!(l.degrade_level(), DegradeLevel::Aggressive);
    }

    #[test]
    fn test_degrade_plan_ask_moderate() {
        let l = ledger(1000, 100.0, 1000);
        l.record(600, 0.0, Duration::ZERO);
        let plan = l.degrade_plan(CommandKind::Ask);
        assert_eq!(plan.level, DegradeLevel::Moderate);
        assert_eq!(plan.depth, Some(2));
        assert!(!plan.self_check);
        assert!(plan.use_rerank);
    }

    #[test]
    fn test_degrade_plan_graph_aggressive() {
        let l = ledger(1000, 100.0, 1000);
        l.record(750, 0.0, Duration::ZERO);
        let plan = l.degrade_plan(CommandKind::GraphQuery);
        assert_eq!(plan.hop_limit, Some(1));
        assert_eq!(plan.max_nodes, Some(60));
        assert_eq!(plan.max_edges, Some(180));
    }

    #[test]
    fn test_degrade_plan_events_and_memory_aggressive() {
        let l = ledger(1000, 100.0, 1000);
        l.record(800, 0.0, Duration::ZERO);
        let events = l.degrade_plan(CommandKind::EventsLink);
        assert_eq!(events.k_final, Some(5));
        assert!(events.skip_alternatives);
        let memory = l.degrade_plan(CommandKind::MemoryStore);
        assert!(memory.recall_only);
    }

    #[test]
    fn test_trends_never_degrades_params() {
        let l = ledger(1000, 100.0, 1000);
        l.record(990, 0.0, Duration::ZERO);
        let plan = l.degrade_plan(CommandKind::Trends);
        assert_eq!(plan.depth, None);
        assert_eq!(plan.k_final, None);
    }

    #[test]
    fn test_warnings_preserve_order() {
        let l = ledger(1000, 100.0, 1000);
        l.add_warning("degradation_rerank_disabled");
        l.add_warning("degradation_window_expanded:6h→24h");
        assert_eq!(
            l.warnings(),
            vec![
                "degradation_rerank_disabled".to_string(),
                "degradation_window_expanded:6h→24h".to_string()
            ]
        );
    }

    #[test]
    fn test_time_exhaustion() {
        let l = ledger(1000, 100.0, 0);
        assert!(l.time_exhausted());
        assert!(!l.can_afford(1, 0.0));
        assert_eq!(l.degrade_level(), DegradeLevel::Aggressive);
    }
}
