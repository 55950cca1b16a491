//! File strategy executor.
//!
//! Asserts on a path's existence or absence, optional content regex, and
//! optional size range. The target path is confined to the project root.

use async_trait::async_trait;
use regex::Regex;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::infrastructure::fs::confine_to_root;

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};

pub struct FileExecutor;

#[async_trait]
impl StrategyExecutor for FileExecutor {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::File {
            path,
            exists,
            content_pattern,
            min_bytes,
            max_bytes,
            ..
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for file executor"));
        };

        let target = confine_to_root(&ctx.project_root, std::path::Path::new(path))?;
        let present = target.exists();

        if !exists {
            return Ok(if present {
                StrategyExecution::failed(format!("{} exists but must not", target.display()))
            } else {
                StrategyExecution::passed(format!("{} is absent as required", target.display()))
            });
        }

        if !present {
            return Ok(StrategyExecution::failed(format!(
                "{} does not exist",
                target.display()
            )));
        }

        let metadata = std::fs::metadata(&target)?;
        if let Some(min) = min_bytes {
            if metadata.len() < *min {
                return Ok(StrategyExecution::failed(format!(
                    "{} is {} bytes, below the {min} byte minimum",
                    target.display(),
                    metadata.len()
                )));
            }
        }
        if let Some(max) = max_bytes {
            if metadata.len() > *max {
                return Ok(StrategyExecution::failed(format!(
                    "{} is {} bytes, above the {max} byte maximum",
                    target.display(),
                    metadata.len()
                )));
            }
        }

        if let Some(pattern) = content_pattern {
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(err) => {
                    return Ok(StrategyExecution::failed(format!(
                        "invalid content pattern `{pattern}`: {err}"
                    )))
                }
            };
            let content = std::fs::read_to_string(&target)?;
            if !re.is_match(&content) {
                return Ok(StrategyExecution::failed(format!(
                    "{} does not match `{pattern}`",
                    target.display()
                )));
            }
        }

        Ok(StrategyExecution::passed(format!(
            "{} satisfies all assertions",
            target.display()
        )))
    }
}
