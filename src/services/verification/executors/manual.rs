//! Manual strategy executor.
//!
//! Never passes automatically: the outcome is always needs_review, with
//! the instructions and checklist surfaced for a human.

use async_trait::async_trait;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};

pub struct ManualExecutor;

#[async_trait]
impl StrategyExecutor for ManualExecutor {
    fn kind(&self) -> &'static str {
        "manual"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Manual {
            instructions,
            checklist,
            ..
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for manual executor"));
        };

        let mut output = format!("Manual verification required:\n{instructions}");
        if !checklist.is_empty() {
            output.push_str("\n\nChecklist:");
            for item in checklist {
                output.push_str(&format!("\n- [ ] {item}"));
            }
        }

        Ok(StrategyExecution::review(output).with_details(serde_json::json!({
            "instructions": instructions,
            "checklist": checklist,
        })))
    }
}
