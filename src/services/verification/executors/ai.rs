//! AI strategy executor.
//!
//! Delegates to the agent invoker with the structured exploration prompt
//! and maps the parsed verdict onto the strategy outcome.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{Task, Verdict, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::services::agent_invoker::CallOptions;
use crate::services::prompts::PromptName;

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};
use super::super::response::parse_exploration;

pub struct AiExecutor;

#[async_trait]
impl StrategyExecutor for AiExecutor {
    fn kind(&self) -> &'static str {
        "ai"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Ai { focus, common } = strategy else {
            return Ok(StrategyExecution::failed("wrong strategy kind for ai executor"));
        };

        let prompt = build_exploration_prompt(
            ctx,
            task,
            focus
                .as_deref()
                .unwrap_or("(no automated checks were run for this strategy)"),
        );

        let options = CallOptions {
            cwd: Some(ctx.project_root.clone()),
            timeout: common.timeout_secs.map(Duration::from_secs),
            ..CallOptions::default()
        };

        let started = std::time::Instant::now();
        let result = ctx.invoker.call_any_available_agent(&prompt, options).await;

        if !result.success {
            let message = result
                .error
                .as_ref()
                .map_or_else(|| "agent call failed".to_string(), |e| e.message.clone());
            let execution = StrategyExecution::failed(format!("ai verification failed: {message}"));
            return Ok(if result.is_transient_failure() {
                execution.transient().with_duration(started.elapsed())
            } else {
                execution.with_duration(started.elapsed())
            });
        }

        let Some(parsed) = parse_exploration(&result.output) else {
            // Unparseable answers are inconclusive, not failures.
            return Ok(StrategyExecution::review(
                "agent returned no parseable JSON verdict",
            )
            .with_duration(started.elapsed()));
        };

        let details = serde_json::json!({
            "criteria": parsed.criteria,
            "suggestions": parsed.suggestions,
            "agent": result.agent_used,
        });
        let summary = parsed
            .reasoning
            .unwrap_or_else(|| format!("agent verdict: {}", parsed.verdict));

        let execution = match parsed.verdict {
            Verdict::Pass => StrategyExecution::passed(summary),
            Verdict::Fail => StrategyExecution::failed(summary),
            Verdict::NeedsReview => StrategyExecution::review(summary),
        };
        Ok(execution.with_details(details).with_duration(started.elapsed()))
    }
}

/// Render the exploration prompt for a task.
pub fn build_exploration_prompt(ctx: &ExecutionContext, task: &Task, check_summary: &str) -> String {
    let criteria = if task.acceptance.is_empty() {
        "(none listed)".to_string()
    } else {
        task.acceptance
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {c}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ctx.prompts.render(
        PromptName::Verification,
        &[
            ("feature_id", task.id.as_str()),
            ("description", task.description.as_str()),
            ("criteria", criteria.as_str()),
            ("check_summary", check_summary),
        ],
    )
}
