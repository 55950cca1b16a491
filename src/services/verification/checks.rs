//! Automated checks orchestrator.
//!
//! Composes the check list in a fixed order (tests, type-check, lint,
//! build, E2E last) and runs it sequentially with a spinner per check, or
//! in parallel with E2E strictly after the unit layer succeeds. Every
//! check subprocess sees `CI=true`.

use std::path::Path;
use std::time::Duration;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};

use crate::infrastructure::process::{run, CommandSpec};

use super::registry::ExecutionContext;

/// Unit-test selection mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestMode {
    Full,
    /// Selective command derived from test discovery over changed files;
    /// falls back to the full suite when discovery returns nothing.
    Quick(Vec<String>),
    Skip,
}

/// E2E selection mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum E2eMode {
    Full,
    /// Only tests tagged as smoke.
    Smoke,
    Tags(Vec<String>),
    Skip,
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct CheckPlan {
    pub test_mode: TestMode,
    pub e2e_mode: E2eMode,
    pub include_type_check: bool,
    pub include_lint: bool,
    pub skip_build: bool,
    pub parallel: bool,
    pub show_spinners: bool,
}

impl Default for CheckPlan {
    fn default() -> Self {
        Self {
            test_mode: TestMode::Full,
            e2e_mode: E2eMode::Full,
            include_type_check: true,
            include_lint: true,
            skip_build: false,
            parallel: false,
            show_spinners: true,
        }
    }
}

/// One executed check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub command: String,
    pub success: bool,
    pub timed_out: bool,
    pub output: String,
    pub duration: Duration,
}

/// All checks from one run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ChecksReport {
    pub results: Vec<CheckResult>,
}

impl ChecksReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// Compact summary for the exploration prompt and progress log.
    pub fn summary(&self) -> String {
        if self.results.is_empty() {
            return "(no automated checks were run)".to_string();
        }
        self.results
            .iter()
            .map(|r| {
                format!(
                    "{}: {} ({:.1}s)",
                    r.name,
                    if r.timed_out {
                        "timed out"
                    } else if r.success {
                        "passed"
                    } else {
                        "failed"
                    },
                    r.duration.as_secs_f64()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
struct PlannedCheck {
    name: &'static str,
    command: String,
    timeout: Option<Duration>,
}

/// Run the automated checks for a project per the plan.
pub async fn run_automated_checks(ctx: &ExecutionContext, plan: &CheckPlan) -> ChecksReport {
    let (unit_layer, e2e) = compose(ctx, plan);
    let mut report = ChecksReport::default();

    if plan.parallel {
        // Unit-layer checks fan out together; E2E only after all succeed.
        let futures: Vec<_> = unit_layer
            .iter()
            .map(|check| execute(ctx, check.clone()))
            .collect();
        report.results.extend(join_all(futures).await);

        if let Some(e2e) = e2e {
            if report.passed() {
                report.results.push(execute(ctx, e2e).await);
            }
        }
    } else {
        for check in unit_layer {
            let spinner = spinner_for(plan, &check);
            let result = execute(ctx, check).await;
            finish_spinner(spinner, &result);
            report.results.push(result);
        }
        if let Some(e2e) = e2e {
            let spinner = spinner_for(plan, &e2e);
            let result = execute(ctx, e2e).await;
            finish_spinner(spinner, &result);
            report.results.push(result);
        }
    }

    report
}

/// Compose the ordered check list: tests, type-check, lint, build, then
/// E2E separately (it always runs last).
fn compose(ctx: &ExecutionContext, plan: &CheckPlan) -> (Vec<PlannedCheck>, Option<PlannedCheck>) {
    let caps = &ctx.capabilities;
    let mut unit_layer = Vec::new();

    match &plan.test_mode {
        TestMode::Skip => {}
        TestMode::Full => {
            if let Some(command) = caps.test.command.clone() {
                unit_layer.push(PlannedCheck {
                    name: "tests",
                    command,
                    timeout: None,
                });
            }
        }
        TestMode::Quick(changed_files) => {
            if let Some(base) = caps.test.command.clone() {
                let selective = discover_selective_tests(&ctx.project_root, changed_files);
                let command = if selective.is_empty() {
                    // Discovery found nothing; fall back to the full suite.
                    base
                } else {
                    format!("{base} {}", selective.join(" "))
                };
                unit_layer.push(PlannedCheck {
                    name: "tests",
                    command,
                    timeout: None,
                });
            }
        }
    }

    if plan.include_type_check {
        if let Some(command) = caps.type_check.command.clone() {
            unit_layer.push(PlannedCheck {
                name: "type-check",
                command,
                timeout: None,
            });
        }
    }
    if plan.include_lint {
        if let Some(command) = caps.lint.command.clone() {
            unit_layer.push(PlannedCheck {
                name: "lint",
                command,
                timeout: None,
            });
        }
    }
    if !plan.skip_build {
        if let Some(command) = caps.build.command.clone() {
            unit_layer.push(PlannedCheck {
                name: "build",
                command,
                timeout: None,
            });
        }
    }

    let e2e = match &plan.e2e_mode {
        E2eMode::Skip => None,
        mode => caps.e2e.as_ref().filter(|e| e.available).and_then(|e2e| {
            let base = e2e.command.clone()?;
            let grep = e2e.grep_template.as_deref().unwrap_or("--grep {tag}");
            let command = match mode {
                E2eMode::Full => base,
                E2eMode::Smoke => format!("{base} {}", grep.replace("{tag}", "@smoke")),
                E2eMode::Tags(tags) => {
                    let filters: Vec<String> =
                        tags.iter().map(|t| grep.replace("{tag}", t)).collect();
                    format!("{base} {}", filters.join(" "))
                }
                E2eMode::Skip => unreachable!(),
            };
            Some(PlannedCheck {
                name: "e2e",
                command,
                timeout: Some(ctx.e2e_timeout),
            })
        }),
    };

    (unit_layer, e2e)
}

async fn execute(ctx: &ExecutionContext, check: PlannedCheck) -> CheckResult {
    let Some((program, args)) = super::executors::split_command(&check.command) else {
        return CheckResult {
            name: check.name.to_string(),
            command: check.command,
            success: false,
            timed_out: false,
            output: "empty command".to_string(),
            duration: Duration::ZERO,
        };
    };

    let mut spec = CommandSpec::new(program)
        .args(args)
        .cwd(ctx.project_root.clone())
        .env("CI", "true");
    if let Some(timeout) = check.timeout {
        spec = spec.timeout(timeout);
    }

    tracing::debug!(check = check.name, command = %spec.display(), "running check");
    match run(&ctx.processes, &spec).await {
        Ok(out) => CheckResult {
            name: check.name.to_string(),
            command: check.command,
            success: out.success(),
            timed_out: out.timed_out,
            output: format!("{}\n{}", out.stdout, out.stderr),
            duration: out.duration,
        },
        Err(err) => CheckResult {
            name: check.name.to_string(),
            command: check.command,
            success: false,
            timed_out: false,
            output: format!("failed to spawn: {err}"),
            duration: Duration::ZERO,
        },
    }
}

fn spinner_for(plan: &CheckPlan, check: &PlannedCheck) -> Option<ProgressBar> {
    if !plan.show_spinners {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("spinner template"),
    );
    spinner.set_message(format!("{}: {}", check.name, check.command));
    spinner.enable_steady_tick(Duration::from_millis(80));
    Some(spinner)
}

fn finish_spinner(spinner: Option<ProgressBar>, result: &CheckResult) {
    if let Some(spinner) = spinner {
        let mark = if result.success { "✓" } else { "✗" };
        spinner.finish_with_message(format!("{mark} {}", result.name));
    }
}

/// Find test files related to the changed source files, for quick mode.
///
/// Walks the conventional test directories and picks files whose derived
/// source path (the inverse of the test→source transform) appears in the
/// changed set.
pub fn discover_selective_tests(root: &Path, changed_files: &[String]) -> Vec<String> {
    let changed: Vec<String> = changed_files
        .iter()
        .map(|f| f.replace('\\', "/"))
        .collect();

    let mut matches = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == "node_modules" || name == "target" {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if !looks_like_test_file(&rel) {
                continue;
            }
            if let Some(source) = crate::services::impact_analyzer::test_to_source(&rel) {
                let stem = source.rsplit_once('.').map_or(source.as_str(), |(s, _)| s);
                if changed.iter().any(|c| {
                    c == &source || c.rsplit_once('.').map_or(c.as_str(), |(s, _)| s) == stem
                }) {
                    matches.push(rel);
                }
            }
        }
    }
    matches.sort();
    matches
}

fn looks_like_test_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.contains(".test.")
        || name.contains(".spec.")
        || path.split('/').any(|s| matches!(s, "tests" | "test" | "__tests__" | "spec"))
}
