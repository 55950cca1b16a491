//! Command strategy executor.
//!
//! Runs a task-declared command after checking it against a fixed
//! deny-regex list. Rejection happens before any spawn, and the working
//! directory is confined to the project root.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::{ForemanError, ForemanResult};
use crate::infrastructure::fs::confine_to_root;
use crate::infrastructure::process::{run, CommandSpec};

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};
use super::split_command;
use super::test::tail;

/// Fixed deny list. Patterns match the fully rendered command line.
const DENY_PATTERNS: &[&str] = &[
    r"\brm\s+(-[a-z]*[rf][a-z]*\s+)+(/|~)",
    r"\bsudo\b",
    r"\bmkfs\b",
    r"\bdd\s+if=",
    r"\bshutdown\b",
    r"\breboot\b",
    r">\s*/dev/sd",
    r":\(\)\s*\{",
    r"\b(curl|wget)\b[^|]*\|\s*(ba)?sh\b",
    r"\bchmod\s+(-[a-zA-Z]+\s+)*777\s+/",
    r"\bgit\s+push\s+.*--force\b",
];

fn deny_list() -> &'static Vec<Regex> {
    static DENY: OnceLock<Vec<Regex>> = OnceLock::new();
    DENY.get_or_init(|| {
        DENY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("deny pattern compiles"))
            .collect()
    })
}

/// Check a rendered command line against the deny list. Returns the
/// offending pattern when one matches.
pub fn denied_by(command_line: &str) -> Option<String> {
    deny_list()
        .iter()
        .find(|re| re.is_match(command_line))
        .map(|re| re.as_str().to_string())
}

pub struct CommandExecutor;

#[async_trait]
impl StrategyExecutor for CommandExecutor {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Command {
            command,
            args,
            expect_exit,
            cwd,
            common,
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for command executor"));
        };

        let rendered = if args.is_empty() {
            command.clone()
        } else {
            format!("{command} {}", args.join(" "))
        };
        if let Some(pattern) = denied_by(&rendered) {
            return Err(ForemanError::DangerousCommand {
                command: rendered,
                pattern,
            });
        }

        let working_dir = match cwd {
            Some(cwd) => confine_to_root(&ctx.project_root, std::path::Path::new(cwd))?,
            None => ctx.project_root.clone(),
        };

        let Some((program, mut base_args)) = split_command(command) else {
            return Ok(StrategyExecution::failed("empty command"));
        };
        base_args.extend(args.iter().cloned());

        let spec = CommandSpec::new(program).args(base_args).cwd(working_dir);
        let spec = ctx.apply_common(spec, common, None);

        tracing::debug!(command = %spec.display(), "running command strategy");
        let out = run(&ctx.processes, &spec).await?;

        if out.timed_out {
            return Ok(StrategyExecution::failed(format!(
                "command timed out: {}",
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
