//! Task file codec: YAML front-matter plus a markdown body.
//!
//! The body carries the description as an H1, an `## Acceptance Criteria`
//! ordered list, an optional `## Notes` section, and any additional user
//! sections, which round-trip verbatim.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::models::{
    Task, TaskOrigin, TaskStatus, TaskType, TddGuidance, TestRequirements, VerificationStrategy,
    VerificationSummary,
};
use crate::domain::{ForemanError, ForemanResult};

/// Structured metadata block at the top of every task file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter {
    id: String,
    module: String,
    priority: u32,
    status: TaskStatus,
    version: u64,
    #[serde(default)]
    origin: TaskOrigin,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    supersedes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    affected_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verification_strategies: Option<Vec<VerificationStrategy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_requirements: Option<TestRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verification: Option<VerificationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tdd_guidance: Option<TddGuidance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

/// Parse a task file. The path is only used to annotate parse errors.
pub fn parse_task(content: &str, path: &Path) -> ForemanResult<Task> {
    let content = content.replace("\r\n", "\n");

    let rest = content.strip_prefix("---\n").ok_or_else(|| ForemanError::Parse {
        path: path.to_path_buf(),
        message: "missing front-matter opening delimiter".to_string(),
    })?;
    let (front, body) = rest.split_once("\n---\n").ok_or_else(|| ForemanError::Parse {
        path: path.to_path_buf(),
        message: "missing front-matter closing delimiter".to_string(),
    })?;

    let front: FrontMatter =
        serde_yaml::from_str(front).map_err(|err| ForemanError::Parse {
            path: path.to_path_buf(),
            message: format!("invalid front-matter: {err}"),
        })?;

    let parsed_body = parse_body(body);

    Ok(Task {
        id: front.id,
        module: front.module,
        priority: front.priority,
        status: front.status,
        description: parsed_body.description,
        acceptance: parsed_body.acceptance,
        depends_on: front.depends_on,
        supersedes: front.supersedes,
        tags: front.tags,
        notes: parsed_body.notes,
        origin: front.origin,
        version: front.version,
        affected_by: front.affected_by,
        task_type: front.task_type,
        verification_strategies: front.verification_strategies,
        test_requirements: front.test_requirements,
        verification: front.verification,
        tdd_guidance: front.tdd_guidance,
        file_path: front.file_path,
        raw_body: parsed_body.extra_sections,
    })
}

/// Serialize a task to its canonical file form.
pub fn serialize_task(task: &Task) -> ForemanResult<String> {
    let front = FrontMatter {
        id: task.id.clone(),
        module: task.module.clone(),
        priority: task.priority,
        status: task.status,
        version: task.version,
        origin: task.origin.clone(),
        depends_on: task.depends_on.clone(),
        supersedes: task.supersedes.clone(),
        tags: task.tags.clone(),
        affected_by: task.affected_by.clone(),
        task_type: task.task_type,
        verification_strategies: task.verification_strategies.clone(),
        test_requirements: task.test_requirements.clone(),
        verification: task.verification.clone(),
        tdd_guidance: task.tdd_guidance.clone(),
        file_path: task.file_path.clone(),
    };

    let yaml = serde_yaml::to_string(&front)?;
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n", task.description));

    if !task.acceptance.is_empty() {
        out.push_str("\n## Acceptance Criteria\n\n");
        for (i, criterion) in task.acceptance.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, criterion));
        }
    }

    if let Some(ref notes) = task.notes {
        out.push_str("\n## Notes\n\n");
        out.push_str(notes);
        out.push('\n');
    }

    if let Some(ref raw) = task.raw_body {
        out.push('\n');
        out.push_str(raw);
        if !raw.ends_with('\n') {
            out.push('\n');
        }
    }

    Ok(out)
}

struct ParsedBody {
    description: String,
    acceptance: Vec<String>,
    notes: Option<String>,
    extra_sections: Option<String>,
}

fn parse_body(body: &str) -> ParsedBody {
    let mut description = String::new();
    let mut acceptance = Vec::new();
    let mut notes: Option<String> = None;
    let mut extra = String::new();

    // Split the body into the H1 line plus `## `-headed sections.
    let mut current_heading: Option<String> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    let mut flush = |heading: &Option<String>,
                     lines: &[&str],
                     acceptance: &mut Vec<String>,
                     notes: &mut Option<String>,
                     extra: &mut String| {
        let Some(heading) = heading else {
            return;
        };
        match heading.trim().to_lowercase().as_str() {
            "acceptance criteria" => {
                for line in lines {
                    if let Some(item) = parse_list_item(line) {
                        acceptance.push(item);
                    }
                }
            }
            "notes" => {
                let text = lines.join("\n").trim().to_string();
                if !text.is_empty() {
                    *notes = Some(text);
                }
            }
            _ => {
                // Unknown section: preserve heading and content verbatim.
                if !extra.is_empty() {
                    extra.push('\n');
                }
                extra.push_str(&format!("## {heading}\n"));
                let text = lines.join("\n");
                let trimmed = text.trim_matches('\n');
                if !trimmed.is_empty() {
                    extra.push('\n');
                    extra.push_str(trimmed);
                    extra.push('\n');
                }
            }
        }
    };

    for line in body.lines() {
        if let Some(h1) = line.strip_prefix("# ") {
            if description.is_empty() && current_heading.is_none() {
                description = h1.trim().to_string();
                continue;
            }
        }
        if let Some(h2) = line.strip_prefix("## ") {
            flush(
                &current_heading,
                &current_lines,
                &mut acceptance,
                &mut notes,
                &mut extra,
            );
            current_heading = Some(h2.to_string());
            current_lines.clear();
            continue;
        }
        if current_heading.is_some() {
            current_lines.push(line);
        }
    }
    flush(
        &current_heading,
        &current_lines,
        &mut acceptance,
        &mut notes,
        &mut extra,
    );

    ParsedBody {
        description,
        acceptance,
        notes,
        extra_sections: if extra.is_empty() { None } else { Some(extra) },
    }
}

/// Accept `1. item`, `2) item`, `- item`, and `* item` forms.
fn parse_list_item(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        return Some(rest.trim().to_string());
    }
    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = &trimmed[digits.len()..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(|s| s.trim().to_string())
}
