//! E2E strategy executor.
//!
//! Runs the detected end-to-end command with pattern-based file filters
//! and tag-based grep via per-framework templates. Defaults to a 120 s
//! timeout unless the strategy overrides it, and always sets `CI=true`.

use async_trait::async_trait;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::infrastructure::process::{run, CommandSpec};

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};
use super::split_command;
use super::test::tail;

pub struct E2eExecutor;

#[async_trait]
impl StrategyExecutor for E2eExecutor {
    fn kind(&self) -> &'static str {
        "e2e"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::E2e {
            pattern,
            tags,
            common,
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for e2e executor"));
        };

        let Some(e2e) = ctx.capabilities.e2e.as_ref().filter(|e| e.available) else {
            return Ok(StrategyExecution::failed(
                "no e2e framework detected for this project",
            ));
        };
        let Some(command) = e2e.command.as_deref() else {
            return Ok(StrategyExecution::failed("e2e framework has no command"));
        };
        let Some((program, mut args)) = split_command(command) else {
            return Ok(StrategyExecution::failed("empty e2e command"));
        };

        if let Some(pattern) = pattern {
            let template = e2e.file_template.as_deref().unwrap_or("{files}");
            args.extend(
                template
                    .replace("{files}", pattern)
                    .split_whitespace()
                    .map(String::from),
            );
        }
        for tag in tags {
            let template = e2e.grep_template.as_deref().unwrap_or("--grep {tag}");
            args.extend(
                template
                    .replace("{tag}", tag)
                    .split_whitespace()
                    .map(String::from),
            );
        }

        let spec = CommandSpec::new(program)
            .args(args)
            .cwd(ctx.project_root.clone())
            .env("CI", "true");
        let spec = ctx.apply_common(spec, common, Some(ctx.e2e_timeout));

        tracing::debug!(command = %spec.display(), "running e2e strategy");
        let out = run(&ctx.processes, &spec).await?;

        let execution = if out.timed_out {
            StrategyExecution::failed(format!("e2e command timed out: {}", spec.display()))
                .transient()
        } else if out.success() {
            StrategyExecution::passed(tail(&out.stdout))
        } else {
            StrategyExecution::failed(format!("{}\n{}", tail(&out.stdout), tail(&out.stderr)))
        };
        Ok(execution.with_duration(out.duration))
    }
}
