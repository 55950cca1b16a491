//! `foreman check`: verify one task, or fast-check the working tree.

use anyhow::{anyhow, bail, Result};

use crate::cli::app::App;
use crate::cli::output;
use crate::domain::models::{Verdict, VerificationResult, VerificationStrategy};
use crate::services::verification::layered::{layered_check, LayeredOptions};
use crate::services::verification::{
    autonomous_verify, resolve_strategies, AutonomousOptions, E2eMode, TestMode,
};

pub struct CheckArgs {
    pub id: Option<String>,
    pub full: bool,
    pub ai: bool,
    pub skip_e2e: bool,
    pub test_pattern: Option<String>,
    pub verbose: bool,
    pub json: bool,
}

pub async fn handle_check(app: &App, args: CheckArgs) -> Result<()> {
    let ctx = app.execution_context(false, args.verbose).await;
    let pipeline = app.pipeline(&ctx);

    match args.id {
        Some(ref id) => {
            let task = app
                .store
                .load_task(id)?
                .ok_or_else(|| anyhow!("task not found: {id}"))?;

            let result = if args.ai {
                let options = AutonomousOptions {
                    test_mode: if args.full {
                        TestMode::Full
                    } else {
                        match args.test_pattern {
                            // A pattern narrows the run like quick mode.
                            Some(ref pattern) => TestMode::Quick(vec![pattern.clone()]),
                            None => TestMode::Full,
                        }
                    },
                    e2e_mode: if args.skip_e2e {
                        E2eMode::Skip
                    } else {
                        E2eMode::Full
                    },
                    skip_build: !args.full,
                    verbose: args.verbose,
                    max_attempts: app.config.verify.transient_retries,
                };
                autonomous_verify(&pipeline, &task, &options).await?
            } else {
                let mut task = task;
                if let Some(ref pattern) = args.test_pattern {
                    task.verification_strategies =
                        Some(with_test_pattern(&task, pattern, args.skip_e2e));
                } else if args.skip_e2e {
                    task.verification_strategies =
                        Some(without_e2e(&task));
                }
                pipeline.verify_task(&task).await?
            };

            report_result(&result, args.json);
            if result.verdict == Verdict::Fail {
                bail!("verification failed for {id}");
            }
            Ok(())
        }
        None => {
            let report = layered_check(
                &pipeline,
                LayeredOptions {
                    ai: args.ai,
                    verbose: args.verbose,
                },
            )
            .await?;

            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "passed": report.passed,
                        "changedFiles": report.changed_files,
                        "highRiskEscalation": report.high_risk_escalation,
                        "impacted": report.impacted,
                        "checks": report.checks.as_ref().map(|c| c.summary()),
                    })
                );
            } else {
                if report.changed_files.is_empty() {
                    output::success("working tree clean, nothing to check");
                    return Ok(());
                }
                output::header(&format!("{} changed file(s)", report.changed_files.len()));
                if report.high_risk_escalation {
                    output::warning(&format!(
                        "high-risk files changed: {}",
                        report.high_risk_files.join(", ")
                    ));
                }
                for impact in &report.impacted {
                    println!(
                        "  {} [{}] {}",
                        impact.task_id,
                        impact.confidence.as_str(),
                        impact.reason
                    );
                }
                if let Some(ref checks) = report.checks {
                    println!("{}", checks.summary());
                }
                if report.passed {
                    output::success("fast check passed");
                } else {
                    output::failure("fast check failed");
                }
            }

            if !report.passed {
                bail!("fast check failed");
            }
            Ok(())
        }
    }
}

/// Resolve the task's strategies and force a pattern onto test legs.
fn with_test_pattern(
    task: &crate::domain::models::Task,
    pattern: &str,
    skip_e2e: bool,
) -> Vec<VerificationStrategy> {
    let (strategies, _) = resolve_strategies(task);
    strategies
        .into_iter()
        .filter(|s| !(skip_e2e && s.kind() == "e2e"))
        .map(|strategy| match strategy {
            VerificationStrategy::Test { cases, common, .. } => VerificationStrategy::Test {
                pattern: Some(pattern.to_string()),
                cases,
                common,
            },
            other => other,
        })
        .collect()
}

fn without_e2e(task: &crate::domain::models::Task) -> Vec<VerificationStrategy> {
    let (strategies, _) = resolve_strategies(task);
    strategies
        .into_iter()
        .filter(|s| s.kind() != "e2e")
        .collect()
}

fn report_result(result: &VerificationResult, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    for outcome in &result.strategies {
        let mark = if outcome.skipped {
            "-"
        } else if outcome.needs_review {
            "?"
        } else if outcome.success {
            "✓"
        } else {
            "✗"
        };
        let label = if outcome.skipped {
            "skipped (optional)"
        } else if outcome.needs_review {
            "needs review"
        } else if outcome.success {
            "passed"
        } else {
            "failed"
        };
        println!("  {mark} {} {label}", outcome.kind);
    }
    for criterion in &result.criteria {
        let mark = if criterion.satisfied { "✓" } else { "✗" };
        println!(
            "  {mark} {} (confidence {:.2})",
            criterion.criterion, criterion.confidence
        );
    }
    if let Some(ref reasoning) = result.reasoning {
        output::dim(reasoning);
    }

    match result.verdict {
        Verdict::Pass => output::success(&format!("{}: pass", result.feature_id)),
        Verdict::Fail => output::failure(&format!("{}: fail", result.feature_id)),
        Verdict::NeedsReview => {
            output::warning(&format!("{}: needs review", result.feature_id));
        }
    }
}
