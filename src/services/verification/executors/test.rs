//! Unit-test strategy executor.
//!
//! Runs the detected test command, optionally restricted to a pattern or
//! named cases. Test subprocesses always see `CI=true`.

use async_trait::async_trait;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::infrastructure::process::{run, CommandSpec};

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};
use super::split_command;

/// Named cases beyond this are dropped to keep the argv bounded.
const MAX_CASE_ARGS: usize = 16;

pub struct TestExecutor;

#[async_trait]
impl StrategyExecutor for TestExecutor {
    fn kind(&self) -> &'static str {
        "test"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Test {
            pattern,
            cases,
            common,
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for test executor"));
        };

        let Some(command) = ctx.capabilities.test.command.as_deref() else {
            return Ok(StrategyExecution::failed(
                "no test command detected for this project",
            ));
        };
        let Some((program, mut args)) = split_command(command) else {
            return Ok(StrategyExecution::failed("empty test command"));
        };

        if let Some(pattern) = pattern {
            args.push(pattern.clone());
        }
        for case in cases.iter().take(MAX_CASE_ARGS) {
            args.push(case.clone());
        }

        let spec = CommandSpec::new(program)
            .args(args)
            .cwd(ctx.project_root.clone())
            .env("CI", "true");
        let spec = ctx.apply_common(spec, common, None);

        tracing::debug!(command = %spec.display(), "running test strategy");
        let out = run(&ctx.processes, &spec).await?;

        let execution = if out.timed_out {
            StrategyExecution::failed(format!("test command timed out: {}", spec.display()))
                .transient()
        } else if out.success() {
            StrategyExecution::passed(tail(&out.stdout))
        } else {
            StrategyExecution::failed(format!(
                "{}\n{}",
                tail(&out.stdout),
                tail(&out.stderr)
            ))
        };
        Ok(execution.with_duration(out.duration))
    }
}

/// Keep the last few KB of tool output; the interesting part of a test
/// run is the summary at the end.
pub(crate) fn tail(text: &str) -> String {
    const KEEP: usize = 4 * 1024;
    if text.len() <= KEEP {
        return text.to_string();
    }
    let mut start = text.len() - KEEP;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[...]\n{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_short_output_intact() {
        assert_eq!(tail("ok"), "ok");
    }

    #[test]
    fn tail_trims_long_output_from_the_front() {
        let long = "x".repeat(10_000);
        let trimmed = tail(&long);
        assert!(trimmed.starts_with("[...]"));
        assert!(trimmed.len() < long.len());
    }
}
