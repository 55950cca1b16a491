//! Autonomous AI verification.
//!
//! Runs the selected subset of automated checks, then issues a single
//! exploration prompt asking the agent to read the working tree and judge
//! each acceptance criterion. Transient agent errors are retried with
//! capped exponential backoff; everything else fails fast.

use std::time::Duration;

use crate::domain::models::{StrategyOutcome, Task, Verdict, VerificationResult};
use crate::domain::ForemanResult;
use crate::services::agent_invoker::CallOptions;

use super::checks::{run_automated_checks, CheckPlan, ChecksReport, E2eMode, TestMode};
use super::executors::ai::build_exploration_prompt;
use super::pipeline::VerificationPipeline;
use super::response::parse_exploration;

/// Options for an autonomous run.
#[derive(Debug, Clone)]
pub struct AutonomousOptions {
    pub test_mode: TestMode,
    pub e2e_mode: E2eMode,
    pub skip_build: bool,
    /// Max attempts for transient agent errors.
    pub max_attempts: u32,
    pub verbose: bool,
}

impl Default for AutonomousOptions {
    fn default() -> Self {
        Self {
            test_mode: TestMode::Full,
            e2e_mode: E2eMode::Full,
            skip_build: false,
            max_attempts: 3,
            verbose: false,
        }
    }
}

/// Run autonomous verification for a task and persist the result.
pub async fn autonomous_verify(
    pipeline: &VerificationPipeline<'_>,
    task: &Task,
    options: &AutonomousOptions,
) -> ForemanResult<VerificationResult> {
    let plan = CheckPlan {
        test_mode: options.test_mode.clone(),
        e2e_mode: options.e2e_mode.clone(),
        skip_build: options.skip_build,
        show_spinners: options.verbose,
        ..CheckPlan::default()
    };
    let checks = run_automated_checks(pipeline.ctx, &plan).await;
    let checks_passed = checks.passed();

    let (verdict, criteria, reasoning, agent) =
        explore_with_retries(pipeline, task, &checks, options).await;

    // A failing automated check is authoritative regardless of how
    // generously the agent read the tree.
    let verdict = if checks_passed { verdict } else { Verdict::Fail };

    let outcomes = checks_to_outcomes(&checks);
    let mut result = pipeline
        .compose_result(task, outcomes, verdict, reasoning)
        .await;
    result.criteria = criteria;
    result.agent = agent;

    pipeline.persist(&result).await?;
    Ok(result)
}

/// Issue the exploration prompt, retrying only transient agent errors
/// with capped exponential backoff.
async fn explore_with_retries(
    pipeline: &VerificationPipeline<'_>,
    task: &Task,
    checks: &ChecksReport,
    options: &AutonomousOptions,
) -> (
    Verdict,
    Vec<crate::domain::models::CriterionResult>,
    Option<String>,
    Option<String>,
) {
    let prompt = build_exploration_prompt(pipeline.ctx, task, &checks.summary());
    let max_attempts = options.max_attempts.max(1);

    let mut attempt: u32 = 0;
    loop {
        let result = pipeline
            .ctx
            .invoker
            .call_any_available_agent(&prompt, CallOptions::in_dir(&pipeline.ctx.project_root))
            .await;

        if result.success {
            let Some(parsed) = parse_exploration(&result.output) else {
                return (
                    Verdict::NeedsReview,
                    Vec::new(),
                    Some("agent returned no parseable JSON verdict".to_string()),
                    result.agent_used,
                );
            };
            return (
                parsed.verdict,
                parsed.criteria,
                parsed.reasoning,
                result.agent_used,
            );
        }

        let transient = result.is_transient_failure();
        attempt += 1;
        if !transient || attempt >= max_attempts {
            let message = result
                .error
                .map_or_else(|| "agent call failed".to_string(), |e| e.message);
            return (
                Verdict::NeedsReview,
                Vec::new(),
                Some(format!("agent unavailable: {message}")),
                result.agent_used,
            );
        }

        let delay =
            Duration::from_secs(2_u64.saturating_pow(attempt - 1)).min(Duration::from_secs(30));
        tracing::info!(
            attempt,
            max_attempts,
            delay_secs = delay.as_secs(),
            "transient agent error, retrying exploration"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Render automated checks as strategy outcomes so one result shape
/// covers both verification modes.
fn checks_to_outcomes(checks: &ChecksReport) -> Vec<StrategyOutcome> {
    checks
        .results
        .iter()
        .map(|check| StrategyOutcome {
            kind: format!("check:{}", check.name),
            required: true,
            success: check.success,
            needs_review: false,
            skipped: false,
            output: Some(check.command.clone()),
            duration_ms: Some(check.duration.as_millis() as u64),
            details: None,
        })
        .collect()
}
