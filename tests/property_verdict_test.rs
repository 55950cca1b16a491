//! Property tests for verdict folding and normalization.

use agent_foreman::domain::models::{fold_outcomes, StrategyOutcome, Verdict};
use proptest::prelude::*;

fn outcome_strategy() -> impl Strategy<Value = StrategyOutcome> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(required, success, needs_review)| {
        StrategyOutcome {
            kind: "test".to_string(),
            required,
            success,
            needs_review,
            skipped: false,
            output: None,
            duration_ms: None,
            details: None,
        }
    })
}

proptest! {
    /// Folding the same outcomes twice yields the same verdict.
    #[test]
    fn folding_is_idempotent(outcomes in prop::collection::vec(outcome_strategy(), 0..8)) {
        prop_assert_eq!(fold_outcomes(&outcomes), fold_outcomes(&outcomes));
    }

    /// Folding is order-independent: a permutation cannot change the verdict.
    #[test]
    fn folding_ignores_order(outcomes in prop::collection::vec(outcome_strategy(), 0..8)) {
        let mut reversed = outcomes.clone();
        reversed.reverse();
        prop_assert_eq!(fold_outcomes(&outcomes), fold_outcomes(&reversed));
    }

    /// A required, non-review failure anywhere forces a fail verdict.
    #[test]
    fn required_failure_dominates(outcomes in prop::collection::vec(outcome_strategy(), 0..8)) {
        let has_blocking_failure = outcomes
            .iter()
            .any(|o| o.required && !o.success && !o.needs_review);
        if has_blocking_failure {
            prop_assert_eq!(fold_outcomes(&outcomes), Verdict::Fail);
        } else {
            prop_assert_ne!(fold_outcomes(&outcomes), Verdict::Fail);
        }
    }

    /// Normalization never panics; anything that is not exactly `pass` or
    /// `fail` lands on needs_review.
    #[test]
    fn normalization_is_total(input in ".*") {
        let verdict = Verdict::normalize(&input);
        match input.trim() {
            "pass" => prop_assert_eq!(verdict, Verdict::Pass),
            "fail" => prop_assert_eq!(verdict, Verdict::Fail),
            _ => prop_assert_eq!(verdict, Verdict::NeedsReview),
        }
    }
}
