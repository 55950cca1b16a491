//! Composite strategy executor.
//!
//! Nests strategies under an and/or operator. AND short-circuits on the
//! first failure; OR short-circuits on the first success. Nested
//! executions go through the registry, so composites may nest composites.

use async_trait::async_trait;

use crate::domain::models::{CompositeOperator, Task, VerificationStrategy};
use crate::domain::ForemanResult;

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};

pub struct CompositeExecutor;

#[async_trait]
impl StrategyExecutor for CompositeExecutor {
    fn kind(&self) -> &'static str {
        "composite"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Composite {
            operator,
            strategies,
            ..
        } = strategy
        else {
            return Ok(StrategyExecution::failed(
                "wrong strategy kind for composite executor",
            ));
        };

        if strategies.is_empty() {
            return Ok(StrategyExecution::failed("composite has no nested strategies"));
        }

        let mut nested_results: Vec<serde_json::Value> = Vec::new();
        let mut short_circuited = false;
        let mut any_success = false;
        let mut any_failure = false;
        let mut any_review = false;

        let total = strategies.len();
        for (position, nested) in strategies.iter().enumerate() {
            let execution = match ctx.registry.execute(ctx, nested, task).await {
                Ok(execution) => execution,
                // Nested executor errors collapse into a failed leg, they
                // never abort the composite.
                Err(err) => StrategyExecution::failed(err.to_string()),
            };

            nested_results.push(serde_json::json!({
                "kind": nested.kind(),
                "success": execution.success,
                "needsReview": execution.needs_review,
                "output": execution.output,
            }));

            if execution.needs_review {
                any_review = true;
            } else if execution.success {
                any_success = true;
            } else {
                any_failure = true;
            }

            let is_last = position + 1 == total;
            match operator {
                CompositeOperator::And if any_failure => {
                    short_circuited = !is_last;
                    break;
                }
                CompositeOperator::Or if any_success => {
                    short_circuited = !is_last;
                    break;
                }
                _ => {}
            }
        }

        let success = match operator {
            CompositeOperator::And => !any_failure && !any_review,
            CompositeOperator::Or => any_success,
        };
        let needs_review = !success
            && any_review
            && match operator {
                CompositeOperator::And => !any_failure,
                CompositeOperator::Or => true,
            };

        let executed = nested_results.len();
        let details = serde_json::json!({
            "operator": match operator {
                CompositeOperator::And => "and",
                CompositeOperator::Or => "or",
            },
            "shortCircuited": short_circuited,
            "nested": nested_results,
        });

        let execution = StrategyExecution {
            success,
            needs_review,
            transient: false,
            output: Some(format!(
                "composite {}: {executed}/{total} nested strategies executed",
                if success { "passed" } else { "failed" }
            )),
            duration_ms: None,
            details: Some(details),
        };
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StrategyCommon;
    use crate::services::verification::test_support::context_for;

    fn file_strategy(path: &str) -> VerificationStrategy {
        VerificationStrategy::File {
            path: path.to_string(),
            exists: true,
            content_pattern: None,
            min_bytes: None,
            max_bytes: None,
            common: StrategyCommon::required(),
        }
    }

    fn composite(
        operator: CompositeOperator,
        strategies: Vec<VerificationStrategy>,
    ) -> VerificationStrategy {
        VerificationStrategy::Composite {
            operator,
            strategies,
            common: StrategyCommon::required(),
        }
    }

    #[tokio::test]
    async fn and_short_circuits_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        // First leg fails; the second (which would pass) never runs.
        let strategy = composite(
            CompositeOperator::And,
            vec![file_strategy("missing.txt"), file_strategy("present.txt")],
        );
        let result = CompositeExecutor
            .execute(&ctx, &strategy, &task)
            .await
            .unwrap();
        assert!(!result.success);

        let details = result.details.unwrap();
        assert_eq!(details["shortCircuited"], serde_json::json!(true));
        assert_eq!(details["nested"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn or_short_circuits_on_first_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        let strategy = composite(
            CompositeOperator::Or,
            vec![file_strategy("present.txt"), file_strategy("missing.txt")],
        );
        let result = CompositeExecutor
            .execute(&ctx, &strategy, &task)
            .await
            .unwrap();
        assert!(result.success);

        let details = result.details.unwrap();
        assert_eq!(details["shortCircuited"], serde_json::json!(true));
        assert_eq!(details["nested"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn or_fails_when_every_leg_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        let strategy = composite(
            CompositeOperator::Or,
            vec![file_strategy("a.txt"), file_strategy("b.txt")],
        );
        let result = CompositeExecutor
            .execute(&ctx, &strategy, &task)
            .await
            .unwrap();
        assert!(!result.success);
        let details = result.details.unwrap();
        assert_eq!(details["shortCircuited"], serde_json::json!(false));
        assert_eq!(details["nested"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn composites_nest_through_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        let inner = composite(CompositeOperator::Or, vec![file_strategy("present.txt")]);
        let outer = composite(
            CompositeOperator::And,
            vec![inner, file_strategy("present.txt")],
        );
        let result = CompositeExecutor.execute(&ctx, &outer, &task).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn manual_inside_and_yields_needs_review() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        let strategy = composite(
            CompositeOperator::And,
            vec![
                file_strategy("present.txt"),
                VerificationStrategy::Manual {
                    instructions: "eyeball it".to_string(),
                    checklist: vec![],
                    common: StrategyCommon::required(),
                },
            ],
        );
        let result = CompositeExecutor
            .execute(&ctx, &strategy, &task)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.needs_review);
    }

    #[tokio::test]
    async fn empty_composite_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("core.x", "x");

        let strategy = composite(CompositeOperator::And, vec![]);
        let result = CompositeExecutor
            .execute(&ctx, &strategy, &task)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(!result.needs_review);
    }
}
