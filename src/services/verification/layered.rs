//! Layered fast check.
//!
//! When no task id is given: diff the working tree, map changed files to
//! impacted tasks, run only the pertinent checks (selective tests when
//! discovery succeeds, build and E2E skipped), and optionally AI-verify
//! each impacted task. High-risk files escalate breadth with a warning.

use crate::domain::models::{TaskImpact, VerificationResult};
use crate::domain::ForemanResult;
use crate::infrastructure::git::GitContext;

use super::autonomous::{autonomous_verify, AutonomousOptions};
use super::checks::{run_automated_checks, CheckPlan, ChecksReport, E2eMode, TestMode};
use super::pipeline::VerificationPipeline;
use crate::services::impact_analyzer::{self, is_high_risk};

/// Options for the layered check.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredOptions {
    /// Also run AI verification for each impacted task.
    pub ai: bool,
    pub verbose: bool,
}

/// Outcome of a layered check run.
#[derive(Debug, Default)]
pub struct LayeredReport {
    pub passed: bool,
    pub changed_files: Vec<String>,
    pub impacted: Vec<TaskImpact>,
    pub high_risk_files: Vec<String>,
    pub high_risk_escalation: bool,
    pub checks: Option<ChecksReport>,
    pub ai_results: Vec<VerificationResult>,
}

/// Run the layered check over the current working tree.
pub async fn layered_check(
    pipeline: &VerificationPipeline<'_>,
    options: LayeredOptions,
) -> ForemanResult<LayeredReport> {
    let git = GitContext::new(&pipeline.ctx.project_root);
    let changed_files = git.changed_files().await;

    // An empty diff short-circuits before any subprocess is spawned.
    if changed_files.is_empty() {
        tracing::info!("no changed files, nothing to check");
        return Ok(LayeredReport {
            passed: true,
            ..LayeredReport::default()
        });
    }

    let impacted = impact_analyzer::task_impact(pipeline.store, &changed_files)?;
    let high_risk_files: Vec<String> = changed_files
        .iter()
        .filter(|f| is_high_risk(f))
        .cloned()
        .collect();
    let high_risk_escalation = !high_risk_files.is_empty();

    if high_risk_escalation {
        tracing::warn!(
            files = ?high_risk_files,
            "high-risk files changed, escalating verification breadth"
        );
    }

    // Base plan: selective tests only; escalation adds type-check and
    // lint. Build and E2E stay skipped by default either way.
    let plan = CheckPlan {
        test_mode: TestMode::Quick(changed_files.clone()),
        e2e_mode: E2eMode::Skip,
        include_type_check: high_risk_escalation,
        include_lint: high_risk_escalation,
        skip_build: true,
        parallel: false,
        show_spinners: options.verbose,
    };
    let checks = run_automated_checks(pipeline.ctx, &plan).await;
    let mut passed = checks.passed();

    let mut ai_results = Vec::new();
    if options.ai && !impacted.is_empty() {
        let autonomous_options = AutonomousOptions {
            test_mode: TestMode::Skip,
            e2e_mode: E2eMode::Skip,
            skip_build: true,
            verbose: options.verbose,
            ..AutonomousOptions::default()
        };
        for impact in &impacted {
            let Some(task) = pipeline.store.load_task(&impact.task_id)? else {
                continue;
            };
            let result = autonomous_verify(pipeline, &task, &autonomous_options).await?;
            if result.verdict == crate::domain::models::Verdict::Fail {
                passed = false;
            }
            ai_results.push(result);
        }
    }

    Ok(LayeredReport {
        passed,
        changed_files,
        impacted,
        high_risk_files,
        high_risk_escalation,
        checks: Some(checks),
        ai_results,
    })
}
