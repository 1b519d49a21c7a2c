//! Property tests for the budget ledger
//!
//! A caller that gates every call through `can_afford` can overshoot a
//! limit by at most one in-flight call, which the response contract
//! bounds at 5% headroom for realistic call sizes.

use std::time::Duration;

use newsloom_core::budget::{BudgetLedger, BudgetLimits};
use proptest::prelude::*;

proptest! {
    #[test]
    fn gated_recording_stays_within_headroom(
        calls in prop::collection::vec((1u64..=2000, 0.01f64..=1.0), 1..60)
    ) {
        // limits sized so a single max call is within the 5% headroom
        let limits = BudgetLimits {
            max_tokens: 40_000,
            max_cost_cents: 25.0,
            max_duration: Duration::from_secs(60),
        };
        let ledger = BudgetLedger::new(limits);
        for (tokens, cents) in calls {
            if ledger.can_afford(tokens, cents) {
                ledger.record(tokens, cents, Duration::from_millis(5));
            }
        }
        let snapshot = ledger.snapshot();
        prop_assert!(snapshot.tokens_used as f64 <= 40_000.0 * 1.05);
        prop_assert!(snapshot.cost_cents_used <= 25.0 * 1.05);
    }

    #[test]
    fn remaining_ratio_always_unit_interval(
        tokens in 0u64..100_000,
        cents in 0.0f64..100.0
    ) {
        let ledger = BudgetLedger::new(BudgetLimits {
            max_tokens: 50_000,
            max_cost_cents: 50.0,
            max_duration: Duration::from_secs(60),
        });
        ledger.record(tokens, cents, Duration::ZERO);
        let ratio = ledger.remaining_ratio();
        prop_assert!((0.0..=1.0).contains(&ratio));
    }

    #[test]
    fn warnings_accumulate_in_order(tags in prop::collection::vec("[a-z_:]{1,20}", 0..20)) {
        let ledger = BudgetLedger::new(BudgetLimits::default());
        for tag in &tags {
            ledger.add_warning(tag.clone());
        }
        prop_assert_eq!(ledger.warnings(), tags);
    }
}
