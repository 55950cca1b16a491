//! Maps changed files to the tasks they plausibly affect.
//!
//! Three confidence tiers: an explicit `affectedBy` glob is high, a source
//! path derived from the task's test pattern is medium, and a bare module
//! segment match is low. Passing and deprecated tasks are excluded.

use std::collections::HashMap;

use glob::Pattern;

use crate::domain::models::{ImpactConfidence, Task, TaskImpact, TaskStatus, VerificationStrategy};
use crate::domain::ForemanResult;
use crate::infrastructure::store::TaskStore;

/// Extensions interchangeable by the test→source transform.
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Compute the impact of a changed-file set on the open task list.
///
/// Results are deduplicated per task keeping the highest-confidence
/// reason, matched files are unioned, and the list is sorted
/// high→medium→low.
pub fn task_impact(store: &TaskStore, changed_files: &[String]) -> ForemanResult<Vec<TaskImpact>> {
    let index = store.load_index()?;
    let mut by_task: HashMap<String, TaskImpact> = HashMap::new();

    for (id, entry) in index.visible_entries() {
        if entry.status == TaskStatus::Passing {
            continue;
        }
        let Some(task) = store.load_task_with_entry(id, Some(entry))? else {
            continue;
        };

        for file in changed_files {
            let file = normalize(file);
            if let Some((confidence, reason)) = match_file(&task, &file) {
                merge(&mut by_task, &task.id, confidence, reason, &file);
            }
        }
    }

    let mut impacts: Vec<TaskImpact> = by_task.into_values().collect();
    impacts.sort_by(|a, b| a.confidence.cmp(&b.confidence).then(a.task_id.cmp(&b.task_id)));
    Ok(impacts)
}

fn match_file(task: &Task, file: &str) -> Option<(ImpactConfidence, String)> {
    // high: explicit affectedBy glob.
    for pattern in &task.affected_by {
        if glob_matches(pattern, file) {
            return Some((
                ImpactConfidence::High,
                format!("matches affectedBy pattern `{pattern}`"),
            ));
        }
    }

    // medium: source path derived from the task's test pattern.
    for test_pattern in test_patterns(task) {
        if let Some(source_pattern) = test_to_source(&test_pattern) {
            if source_matches(&source_pattern, file) {
                return Some((
                    ImpactConfidence::Medium,
                    format!("source of test pattern `{test_pattern}`"),
                ));
            }
        }
    }

    // low: the path contains the task's module segment.
    if module_segment_match(&task.module, file) {
        return Some((
            ImpactConfidence::Low,
            format!("path contains module `{}`", task.module),
        ));
    }

    None
}

fn merge(
    by_task: &mut HashMap<String, TaskImpact>,
    task_id: &str,
    confidence: ImpactConfidence,
    reason: String,
    file: &str,
) {
    let impact = by_task.entry(task_id.to_string()).or_insert_with(|| TaskImpact {
        task_id: task_id.to_string(),
        reason: reason.clone(),
        confidence,
        matched_files: Vec::new(),
    });
    // Keep the highest-confidence reason; High < Medium < Low in Ord.
    if confidence < impact.confidence {
        impact.confidence = confidence;
        impact.reason = reason;
    }
    if !impact.matched_files.iter().any(|f| f == file) {
        impact.matched_files.push(file.to_string());
    }
}

fn test_patterns(task: &Task) -> Vec<String> {
    let mut patterns = Vec::new();
    if let Some(ref requirements) = task.test_requirements {
        if let Some(ref unit) = requirements.unit {
            if let Some(ref pattern) = unit.pattern {
                patterns.push(pattern.clone());
            }
        }
    }
    if let Some(ref strategies) = task.verification_strategies {
        for strategy in strategies {
            if let VerificationStrategy::Test {
                pattern: Some(pattern),
                ..
            } = strategy
            {
                patterns.push(pattern.clone());
            }
        }
    }
    patterns
}

/// The fixed test→source transform: a `tests|test|__tests__|spec` path
/// segment becomes `src`, and a `.test`/`.spec` infix before the extension
/// is stripped.
pub fn test_to_source(test_pattern: &str) -> Option<String> {
    let normalized = normalize(test_pattern);
    let mut segments: Vec<String> = normalized.split('/').map(String::from).collect();

    let mut mapped_dir = false;
    for segment in &mut segments {
        if matches!(segment.as_str(), "tests" | "test" | "__tests__" | "spec") {
            *segment = "src".to_string();
            mapped_dir = true;
            break;
        }
    }

    let last = segments.last_mut()?;
    let mut stripped_infix = false;
    for infix in [".test.", ".spec."] {
        if let Some(pos) = last.find(infix) {
            let extension = &last[pos + infix.len()..];
            *last = format!("{}.{}", &last[..pos], extension);
            stripped_infix = true;
            break;
        }
    }

    if mapped_dir || stripped_infix {
        Some(segments.join("/"))
    } else {
        None
    }
}

fn source_matches(source_pattern: &str, file: &str) -> bool {
    if glob_matches(source_pattern, file) {
        return true;
    }
    // The transform accepts any of the interchangeable source extensions.
    let (pattern_stem, pattern_ext) = split_extension(source_pattern);
    let (file_stem, file_ext) = split_extension(file);
    if SOURCE_EXTENSIONS.contains(&pattern_ext) && SOURCE_EXTENSIONS.contains(&file_ext) {
        return glob_matches(pattern_stem, file_stem);
    }
    false
}

fn split_extension(path: &str) -> (&str, &str) {
    match path.rfind('.') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (path, ""),
    }
}

fn glob_matches(pattern: &str, file: &str) -> bool {
    Pattern::new(&normalize(pattern)).is_ok_and(|p| p.matches(file))
}

fn module_segment_match(module: &str, file: &str) -> bool {
    if module.is_empty() {
        return false;
    }
    file.split('/').any(|segment| {
        segment == module || segment.strip_suffix(".md").is_some_and(|s| s == module) || {
            // Filenames like `auth_service.ts` still count for module `auth`.
            let stem = segment.split('.').next().unwrap_or(segment);
            stem.split(['_', '-']).any(|part| part == module)
        }
    })
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

// ---------------------------------------------------------------------------
// High-risk files
// ---------------------------------------------------------------------------

/// Whether a changed file warrants escalating verification breadth:
/// dependency manifests, lockfiles, compiler/linter/test-runner configs,
/// and top-level environment files.
pub fn is_high_risk(file: &str) -> bool {
    let normalized = normalize(file);
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);

    const MANIFESTS: &[&str] = &[
        "package.json",
        "Cargo.toml",
        "go.mod",
        "pyproject.toml",
        "requirements.txt",
        "Gemfile",
        "composer.json",
    ];
    const LOCKFILES: &[&str] = &[
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "bun.lockb",
        "Cargo.lock",
        "poetry.lock",
        "go.sum",
    ];
    const CONFIG_PREFIXES: &[&str] = &[
        "tsconfig",
        "jsconfig",
        ".eslintrc",
        "eslint.config",
        ".babelrc",
        "babel.config",
        "jest.config",
        "vitest.config",
        "playwright.config",
        "cypress.config",
        "webpack.config",
        "vite.config",
        "rollup.config",
        ".prettierrc",
        "prettier.config",
    ];

    if MANIFESTS.contains(&name) || LOCKFILES.contains(&name) {
        return true;
    }
    if CONFIG_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return true;
    }
    // Env files count only at the repository top level.
    if !normalized.contains('/') && name.starts_with(".env") {
        return true;
    }
    false
}
