//! Verification results and verdict folding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final classification of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    NeedsReview,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NeedsReview => "needs_review",
        }
    }

    /// Normalize an arbitrary string into a verdict. Anything that is not
    /// exactly `pass`, `fail`, or `needs_review` becomes `needs_review`.
    pub fn normalize(s: &str) -> Self {
        match s.trim() {
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            _ => Self::NeedsReview,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing one strategy, reported in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyOutcome {
    /// Strategy kind (registry key).
    pub kind: String,
    /// Whether the strategy was declared required.
    pub required: bool,
    /// Whether the underlying check succeeded.
    pub success: bool,
    /// Whether the strategy asks for human review instead of pass/fail.
    #[serde(default)]
    pub needs_review: bool,
    /// An optional failure of a non-required strategy is rendered skipped.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Executor-specific detail payload (nested composite results etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StrategyOutcome {
    /// Whether this outcome forces the overall verdict to fail.
    fn is_blocking_failure(&self) -> bool {
        self.required && !self.success && !self.needs_review
    }
}

/// Fold strategy outcomes into an overall verdict.
///
/// A required failure wins over everything; otherwise any needs_review
/// outcome demotes the run; otherwise pass. Folding is idempotent: the
/// same outcomes always produce the same verdict.
pub fn fold_outcomes(outcomes: &[StrategyOutcome]) -> Verdict {
    if outcomes.iter().any(StrategyOutcome::is_blocking_failure) {
        Verdict::Fail
    } else if outcomes.iter().any(|o| o.needs_review) {
        Verdict::NeedsReview
    } else {
        Verdict::Pass
    }
}

/// Per-criterion judgement from AI exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    pub criterion: String,
    pub satisfied: bool,
    /// Confidence in [0, 1]; clamped on parse.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Snapshot produced by a verification run; persisted per-run to the
/// verification store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub feature_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub strategies: Vec<StrategyOutcome>,
    #[serde(default)]
    pub criteria: Vec<CriterionResult>,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Identity of the agent used, when one was involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(required: bool, success: bool, needs_review: bool) -> StrategyOutcome {
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
    }

    #[test]
    fn required_failure_folds_to_fail() {
        let outcomes = vec![outcome(true, false, false), outcome(true, true, false)];
        assert_eq!(fold_outcomes(&outcomes), Verdict::Fail);
    }

    #[test]
    fn optional_failure_does_not_fail_the_run() {
        let outcomes = vec![outcome(false, false, false), outcome(true, true, false)];
        assert_eq!(fold_outcomes(&outcomes), Verdict::Pass);
    }

    #[test]
    fn needs_review_demotes_a_passing_run() {
        let outcomes = vec![outcome(true, true, false), outcome(true, false, true)];
        assert_eq!(fold_outcomes(&outcomes), Verdict::NeedsReview);
    }

    #[test]
    fn required_failure_wins_over_needs_review() {
        let outcomes = vec![outcome(true, false, true), outcome(true, false, false)];
        assert_eq!(fold_outcomes(&outcomes), Verdict::Fail);
    }

    #[test]
    fn empty_outcomes_pass() {
        assert_eq!(fold_outcomes(&[]), Verdict::Pass);
    }

    #[test]
    fn folding_is_idempotent() {
        let outcomes = vec![outcome(true, true, false), outcome(false, false, false)];
        let first = fold_outcomes(&outcomes);
        let second = fold_outcomes(&outcomes);
        assert_eq!(first, second);
    }

    #[test]
    fn verdict_normalization() {
        assert_eq!(Verdict::normalize("pass"), Verdict::Pass);
        assert_eq!(Verdict::normalize("fail"), Verdict::Fail);
        assert_eq!(Verdict::normalize("needs_review"), Verdict::NeedsReview);
        // Anything non-enum becomes needs_review, never an error.
        assert_eq!(
            Verdict::normalize("pass|fail|needs_review"),
            Verdict::NeedsReview
        );
        assert_eq!(Verdict::normalize("PASS"), Verdict::NeedsReview);
        assert_eq!(Verdict::normalize(""), Verdict::NeedsReview);
    }
}
