//! Impact analysis results: which tasks a changed file plausibly affects.

use serde::{Deserialize, Serialize};

/// Confidence tier for a match, ordered high to low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactConfidence {
    High,
    Medium,
    Low,
}

impl ImpactConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// One impacted task with the files and reason that matched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskImpact {
    pub task_id: String,
    pub reason: String,
    pub confidence: ImpactConfidence,
    pub matched_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_ordering_is_high_first() {
        let mut tiers = [
            ImpactConfidence::Low,
            ImpactConfidence::High,
            ImpactConfidence::Medium,
        ];
        tiers.sort();
        assert_eq!(
            tiers,
            [
                ImpactConfidence::High,
                ImpactConfidence::Medium,
                ImpactConfidence::Low
            ]
        );
    }
}
