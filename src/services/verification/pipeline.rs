//! Strategy-based verification: resolution, execution, folding, and
//! persistence.
//!
//! Strategies resolve in a fixed priority: explicit declarations beat the
//! legacy testRequirements conversion, which beats task-type defaults,
//! with a single ai strategy as the final fallback. Results are reported
//! in declaration order and folded into one verdict; every run leaves a
//! durable artifact, a task summary, and a progress entry.

use std::time::Duration;

use chrono::Utc;

use crate::domain::models::{
    fold_outcomes, ExitExpectation, ProgressEntry, ProgressKind, StrategyCommon, StrategyOutcome,
    Task, TaskType, Verdict, VerificationResult, VerificationStrategy, VerificationSummary,
};
use crate::domain::ForemanResult;
use crate::infrastructure::git::GitContext;
use crate::infrastructure::store::{ProgressLog, TaskStore, VerificationStore};

use super::registry::{ExecutionContext, StrategyExecution};

/// Where the executed strategies came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategySource {
    Explicit,
    LegacyRequirements,
    TaskTypeDefault,
    AiFallback,
}

/// Resolve the strategies to execute for a task.
pub fn resolve_strategies(task: &Task) -> (Vec<VerificationStrategy>, StrategySource) {
    if let Some(ref strategies) = task.verification_strategies {
        if !strategies.is_empty() {
            return (strategies.clone(), StrategySource::Explicit);
        }
    }

    if let Some(ref requirements) = task.test_requirements {
        let mut converted = Vec::new();
        if let Some(ref unit) = requirements.unit {
            converted.push(VerificationStrategy::Test {
                pattern: unit.pattern.clone(),
                cases: unit.cases.clone(),
                common: StrategyCommon::required(),
            });
        }
        if let Some(ref e2e) = requirements.e2e {
            converted.push(VerificationStrategy::E2e {
                pattern: e2e.pattern.clone(),
                tags: e2e.tags.clone(),
                common: StrategyCommon::required(),
            });
        }
        if !converted.is_empty() {
            return (converted, StrategySource::LegacyRequirements);
        }
    }

    if let Some(task_type) = task.task_type {
        return (task_type_defaults(task_type), StrategySource::TaskTypeDefault);
    }

    (
        vec![VerificationStrategy::ai_fallback()],
        StrategySource::AiFallback,
    )
}

fn task_type_defaults(task_type: TaskType) -> Vec<VerificationStrategy> {
    match task_type {
        TaskType::Code => vec![
            VerificationStrategy::Test {
                pattern: None,
                cases: vec![],
                common: StrategyCommon::required(),
            },
            VerificationStrategy::ai_fallback(),
        ],
        TaskType::Ops => vec![
            VerificationStrategy::Script {
                path: "./verify.sh".to_string(),
                args: vec![],
                expect_exit: ExitExpectation::default(),
                cwd: None,
                common: StrategyCommon::required(),
            },
            VerificationStrategy::ai_fallback(),
        ],
        TaskType::Data => vec![
            VerificationStrategy::File {
                path: "data".to_string(),
                exists: true,
                content_pattern: None,
                min_bytes: None,
                max_bytes: None,
                common: StrategyCommon::required(),
            },
            VerificationStrategy::ai_fallback(),
        ],
        TaskType::Infra => vec![
            VerificationStrategy::Command {
                command: "terraform".to_string(),
                args: vec!["validate".to_string()],
                expect_exit: ExitExpectation::default(),
                cwd: None,
                common: StrategyCommon::required(),
            },
            VerificationStrategy::ai_fallback(),
        ],
        TaskType::Manual => vec![VerificationStrategy::Manual {
            instructions: "Verify this task by hand and mark it done or failed.".to_string(),
            checklist: vec![],
            common: StrategyCommon::required(),
        }],
    }
}

/// Executes strategies for a task and persists the composed result.
pub struct VerificationPipeline<'a> {
    pub store: &'a TaskStore,
    pub artifacts: &'a VerificationStore,
    pub progress: &'a ProgressLog,
    pub ctx: &'a ExecutionContext,
}

impl VerificationPipeline<'_> {
    /// Run strategy-based verification for a task.
    pub async fn verify_task(&self, task: &Task) -> ForemanResult<VerificationResult> {
        let (strategies, source) = resolve_strategies(task);
        tracing::info!(
            task_id = %task.id,
            strategies = strategies.len(),
            source = ?source,
            "verifying task"
        );

        let mut outcomes: Vec<StrategyOutcome> = Vec::with_capacity(strategies.len());
        for strategy in &strategies {
            let outcome = self.run_strategy(strategy, task).await;
            outcomes.push(outcome);
        }

        let verdict = fold_outcomes(&outcomes);
        let result = self.compose_result(task, outcomes, verdict, None).await;
        self.persist(&result).await?;
        Ok(result)
    }

    /// Execute one strategy with its declared retries. Retries apply only
    /// to transient failures; executor errors collapse into failed
    /// outcomes and never escape the pipeline.
    async fn run_strategy(&self, strategy: &VerificationStrategy, task: &Task) -> StrategyOutcome {
        let common = strategy.common();
        let retries = common.retries.unwrap_or(0);
        let mut attempt: u32 = 0;

        let execution = loop {
            let execution = match self.ctx.registry.execute(self.ctx, strategy, task).await {
                Ok(execution) => execution,
                Err(err) => {
                    tracing::warn!(kind = strategy.kind(), error = %err, "strategy executor error");
                    StrategyExecution::failed(err.to_string())
                }
            };

            if execution.success || !execution.transient || attempt >= retries {
                break execution;
            }
            attempt += 1;
            let delay = Duration::from_millis(500_u64.saturating_mul(2_u64.pow(attempt - 1)))
                .min(Duration::from_secs(5));
            tracing::debug!(
                kind = strategy.kind(),
                attempt,
                retries,
                "transient strategy failure, retrying"
            );
            tokio::time::sleep(delay).await;
        };

        let skipped = !common.required && !execution.success && !execution.needs_review;
        StrategyOutcome {
            kind: strategy.kind().to_string(),
            required: common.required,
            success: execution.success,
            needs_review: execution.needs_review,
            skipped,
            output: execution.output,
            duration_ms: execution.duration_ms,
            details: execution.details,
        }
    }

    /// Build the result snapshot with git context attached.
    pub async fn compose_result(
        &self,
        task: &Task,
        outcomes: Vec<StrategyOutcome>,
        verdict: Verdict,
        reasoning: Option<String>,
    ) -> VerificationResult {
        let git = GitContext::new(&self.ctx.project_root);
        let agent = outcomes
            .iter()
            .filter_map(|o| o.details.as_ref())
            .filter_map(|d| d.get("agent").and_then(|a| a.as_str()))
            .next_back()
            .map(String::from);

        VerificationResult {
            feature_id: task.id.clone(),
            timestamp: Utc::now(),
            commit_hash: git.current_commit().await,
            changed_files: git.changed_files().await,
            strategies: outcomes,
            criteria: Vec::new(),
            verdict,
            reasoning,
            agent,
        }
    }

    /// Persist the run: artifact, task summary via the quick path, VERIFY
    /// progress entry.
    pub async fn persist(&self, result: &VerificationResult) -> ForemanResult<()> {
        self.artifacts.save(result)?;

        let summary = VerificationSummary {
            verdict: result.verdict,
            timestamp: result.timestamp,
            agent: result.agent.clone(),
        };
        self.store
            .update_verification_quick(&result.feature_id, summary)
            .await?;

        self.progress.append(
            &ProgressEntry::new(
                ProgressKind::Verify,
                format!("verdict {}", result.verdict),
            )
            .with_feature(result.feature_id.clone())
            .with_details(format!(
                "{} strategies, {} failed",
                result.strategies.len(),
                result
                    .strategies
                    .iter()
                    .filter(|s| !s.success && !s.skipped && !s.needs_review)
                    .count()
            )),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        IndexEntry, RetryConfig, TaskIndex, TaskStatus, TestRequirements, UnitTestRequirement,
    };
    use crate::infrastructure::store::StateLayout;
    use crate::services::verification::test_support::context_for;

    fn seeded(dir: &std::path::Path, task: &Task) -> TaskStore {
        let store = TaskStore::new(StateLayout::new(dir, "ai"), RetryConfig::default());
        let saved = store.save_task(task).unwrap();
        let mut index = TaskIndex::empty();
        index.features.insert(
            saved.id.clone(),
            IndexEntry {
                status: saved.status,
                priority: saved.priority,
                module: saved.module.clone(),
                description: saved.description.clone(),
                file_path: saved.file_path.clone(),
            },
        );
        store.save_index(&mut index).unwrap();
        store
    }

    #[test]
    fn explicit_strategies_win() {
        let mut task = Task::new("core.x", "x").with_task_type(TaskType::Code);
        task.verification_strategies = Some(vec![VerificationStrategy::ai_fallback()]);
        let (strategies, source) = resolve_strategies(&task);
        assert_eq!(source, StrategySource::Explicit);
        assert_eq!(strategies.len(), 1);
    }

    #[test]
    fn legacy_requirements_convert() {
        let mut task = Task::new("core.x", "x").with_task_type(TaskType::Code);
        task.test_requirements = Some(TestRequirements {
            unit: Some(UnitTestRequirement {
                pattern: Some("auth/**".to_string()),
                cases: vec!["login works".to_string()],
            }),
            e2e: None,
        });
        let (strategies, source) = resolve_strategies(&task);
        assert_eq!(source, StrategySource::LegacyRequirements);
        assert_eq!(strategies.len(), 1);
        assert!(matches!(
            &strategies[0],
            VerificationStrategy::Test { pattern: Some(p), .. } if p == "auth/**"
        ));
    }

    #[test]
    fn task_type_defaults_apply() {
        let task = Task::new("infra.vpc", "VPC").with_task_type(TaskType::Infra);
        let (strategies, source) = resolve_strategies(&task);
        assert_eq!(source, StrategySource::TaskTypeDefault);
        assert!(matches!(
            &strategies[0],
            VerificationStrategy::Command { command, .. } if command == "terraform"
        ));
        assert_eq!(strategies[1].kind(), "ai");

        let manual = Task::new("ops.drill", "Drill").with_task_type(TaskType::Manual);
        let (strategies, _) = resolve_strategies(&manual);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].kind(), "manual");
    }

    #[test]
    fn bare_task_falls_back_to_ai() {
        let task = Task::new("core.x", "x");
        let (strategies, source) = resolve_strategies(&task);
        assert_eq!(source, StrategySource::AiFallback);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].kind(), "ai");
    }

    #[tokio::test]
    async fn verify_persists_artifact_summary_and_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("target.txt"), "present").unwrap();

        let mut task = Task::new("core.x", "Check a file");
        task.verification_strategies = Some(vec![VerificationStrategy::File {
            path: "target.txt".to_string(),
            exists: true,
            content_pattern: None,
            min_bytes: None,
            max_bytes: None,
            common: StrategyCommon::required(),
        }]);
        let store = seeded(dir.path(), &task);
        let task = store.load_task("core.x").unwrap().unwrap();

        let ctx = context_for(dir.path());
        let artifacts = VerificationStore::new(store.layout().verification_dir());
        let progress = ProgressLog::new(store.layout().progress_log_path());
        let pipeline = VerificationPipeline {
            store: &store,
            artifacts: &artifacts,
            progress: &progress,
            ctx: &ctx,
        };

        let result = pipeline.verify_task(&task).await.unwrap();
        assert_eq!(result.verdict, Verdict::Pass);

        // Artifact persisted.
        let latest = artifacts.latest_for("core.x").unwrap().unwrap();
        assert_eq!(latest.verdict, Verdict::Pass);

        // Task summary updated through the quick path.
        let reloaded = store.load_task("core.x").unwrap().unwrap();
        assert_eq!(reloaded.verification.unwrap().verdict, Verdict::Pass);

        // VERIFY progress entry appended.
        let tail = progress.tail(5).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].kind, ProgressKind::Verify);
        assert_eq!(tail[0].feature_id.as_deref(), Some("core.x"));
    }

    #[tokio::test]
    async fn optional_failures_render_skipped_and_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();

        let mut task = Task::new("core.x", "Mixed strategies");
        task.verification_strategies = Some(vec![
            VerificationStrategy::File {
                path: "present.txt".to_string(),
                exists: true,
                content_pattern: None,
                min_bytes: None,
                max_bytes: None,
                common: StrategyCommon::required(),
            },
            VerificationStrategy::File {
                path: "missing.txt".to_string(),
                exists: true,
                content_pattern: None,
                min_bytes: None,
                max_bytes: None,
                common: StrategyCommon::optional(),
            },
        ]);
        let store = seeded(dir.path(), &task);
        let task = store.load_task("core.x").unwrap().unwrap();

        let ctx = context_for(dir.path());
        let artifacts = VerificationStore::new(store.layout().verification_dir());
        let progress = ProgressLog::new(store.layout().progress_log_path());
        let pipeline = VerificationPipeline {
            store: &store,
            artifacts: &artifacts,
            progress: &progress,
            ctx: &ctx,
        };

        let result = pipeline.verify_task(&task).await.unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.strategies.len(), 2);
        assert!(result.strategies[1].skipped);
        assert!(!result.strategies[1].success);
    }

    #[tokio::test]
    async fn required_failure_folds_to_fail_but_keeps_status() {
        let dir = tempfile::tempdir().unwrap();

        let mut task = Task::new("core.x", "Failing check").with_status(TaskStatus::Failing);
        task.verification_strategies = Some(vec![VerificationStrategy::File {
            path: "missing.txt".to_string(),
            exists: true,
            content_pattern: None,
            min_bytes: None,
            max_bytes: None,
            common: StrategyCommon::required(),
        }]);
        let store = seeded(dir.path(), &task);
        let task = store.load_task("core.x").unwrap().unwrap();

        let ctx = context_for(dir.path());
        let artifacts = VerificationStore::new(store.layout().verification_dir());
        let progress = ProgressLog::new(store.layout().progress_log_path());
        let pipeline = VerificationPipeline {
            store: &store,
            artifacts: &artifacts,
            progress: &progress,
            ctx: &ctx,
        };

        let result = pipeline.verify_task(&task).await.unwrap();
        assert_eq!(result.verdict, Verdict::Fail);

        // A failed verification records the summary but does not move the
        // task out of its prior status; only done/fail do that.
        let reloaded = store.load_task("core.x").unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Failing);
        assert_eq!(reloaded.verification.unwrap().verdict, Verdict::Fail);
    }
}
