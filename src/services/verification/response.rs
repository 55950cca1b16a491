//! Parsing the AI exploration answer.
//!
//! The agent returns a JSON object, possibly wrapped in a markdown fence.
//! The parser is deliberately forgiving: a missing or malformed field
//! never explodes, and any verdict that is not exactly one of the enum
//! values normalizes to `needs_review`.

use serde::Deserialize;

use crate::domain::models::{CriterionResult, Verdict};
use crate::services::wire::extract_json;

/// The parsed exploration answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerification {
    pub criteria: Vec<CriterionResult>,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
    pub suggestions: Vec<String>,
    pub code_quality_notes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    #[serde(default)]
    criteria_results: Vec<RawCriterion>,
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    overall_reasoning: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    code_quality_notes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCriterion {
    #[serde(default)]
    criterion: String,
    #[serde(default)]
    satisfied: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    evidence: Option<String>,
}

/// Parse an agent's exploration output. Returns `None` only when no JSON
/// object can be located at all.
pub fn parse_exploration(output: &str) -> Option<ParsedVerification> {
    let json = extract_json(output)?;
    let raw: RawResponse = serde_json::from_str(&json).ok()?;

    let criteria = raw
        .criteria_results
        .into_iter()
        .map(|c| CriterionResult {
            criterion: c.criterion,
            satisfied: c.satisfied,
            confidence: c.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            evidence: c.evidence,
        })
        .collect();

    let verdict = Verdict::normalize(raw.verdict.as_deref().unwrap_or(""));

    Some(ParsedVerification {
        criteria,
        verdict,
        reasoning: raw.overall_reasoning,
        suggestions: raw.suggestions,
        code_quality_notes: raw.code_quality_notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_answer() {
        let output = r#"```json
{
  "criteriaResults": [
    {"criterion": "prints hello", "satisfied": true, "confidence": 0.95, "evidence": "src/main.rs:4"}
  ],
  "verdict": "pass",
  "overallReasoning": "The binary prints hello.",
  "suggestions": ["add a farewell"],
  "codeQualityNotes": []
}
```"#;
        let parsed = parse_exploration(output).unwrap();
        assert_eq!(parsed.verdict, Verdict::Pass);
        assert_eq!(parsed.criteria.len(), 1);
        assert!(parsed.criteria[0].satisfied);
        assert!((parsed.criteria[0].confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(parsed.suggestions, vec!["add a farewell"]);
    }

    #[test]
    fn non_enum_verdict_normalizes_to_needs_review() {
        // The agent echoed the schema placeholder instead of choosing.
        let output = r#"{"verdict": "pass|fail|needs_review", "criteriaResults": []}"#;
        let parsed = parse_exploration(output).unwrap();
        assert_eq!(parsed.verdict, Verdict::NeedsReview);
    }

    #[test]
    fn missing_verdict_normalizes_to_needs_review() {
        let output = r#"{"criteriaResults": []}"#;
        let parsed = parse_exploration(output).unwrap();
        assert_eq!(parsed.verdict, Verdict::NeedsReview);
    }

    #[test]
    fn confidence_is_clamped() {
        let output =
            r#"{"verdict": "fail", "criteriaResults": [{"criterion": "x", "satisfied": false, "confidence": 3.5}]}"#;
        let parsed = parse_exploration(output).unwrap();
        assert!((parsed.criteria[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prose_around_the_object_is_tolerated() {
        let output = "Sure! Here is my assessment.\n{\"verdict\": \"fail\"}\nLet me know.";
        let parsed = parse_exploration(output).unwrap();
        assert_eq!(parsed.verdict, Verdict::Fail);
    }

    #[test]
    fn no_json_at_all_is_none() {
        assert!(parse_exploration("I could not complete the task.").is_none());
    }
}
