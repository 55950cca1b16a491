//! Script strategy executor.
//!
//! Executes a project-relative script with a bounded argument list. Both
//! the script path and any declared working directory are re-checked to
//! lie under the project root before spawn.

use async_trait::async_trait;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::infrastructure::fs::confine_to_root;
use crate::infrastructure::process::{run, CommandSpec};

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};
use super::test::tail;

/// Arguments beyond this are rejected, not silently dropped.
const MAX_ARGS: usize = 32;

pub struct ScriptExecutor;

#[async_trait]
impl StrategyExecutor for ScriptExecutor {
    fn kind(&self) -> &'static str {
        "script"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Script {
            path,
            args,
            expect_exit,
            cwd,
            common,
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for script executor"));
        };

        if args.len() > MAX_ARGS {
            return Ok(StrategyExecution::failed(format!(
                "script argument list too long: {} > {MAX_ARGS}",
                args.len()
            )));
        }

        // Path confinement happens before any spawn.
        let script_path = confine_to_root(&ctx.project_root, std::path::Path::new(path))?;
        let working_dir = match cwd {
            Some(cwd) => confine_to_root(&ctx.project_root, std::path::Path::new(cwd))?,
            None => ctx.project_root.clone(),
        };

        if !script_path.exists() {
            return Ok(StrategyExecution::failed(format!(
                "script not found: {}",
                script_path.display()
            )));
        }

        let spec = CommandSpec::new(script_path.to_string_lossy().into_owned())
            .args(args.iter().cloned())
            .cwd(working_dir);
        let spec = ctx.apply_common(spec, common, None);

        tracing::debug!(command = %spec.display(), "running script strategy");
        let out = run(&ctx.processes, &spec).await?;

        if out.timed_out {
            return Ok(StrategyExecution::failed(format!(
                "script timed out: {}",
                spec.display()
            ))
            .transient()
            .with_duration(out.duration));
        }

        let code = out.exit_code.unwrap_or(-1);
        let execution = if expect_exit.matches(code) {
            StrategyExecution::passed(tail(&out.stdout))
        } else {
            StrategyExecution::failed(format!(
                "exit code {code} did not match expectation\n{}",
                tail(&out.stderr)
            ))
        };
        Ok(execution
            .with_details(serde_json::json!({ "exitCode": code }))
            .with_duration(out.duration))
    }
}
