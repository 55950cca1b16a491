//! Task domain model.
//!
//! Tasks are discrete units of work with acceptance criteria, persisted as
//! markdown files outside any agent's context. A task whose id ends in
//! `.BREAKDOWN` decomposes a module into implementation tasks and is always
//! selected before them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::VerificationStrategy;
use super::verification::Verdict;

/// Status of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Work is outstanding; the task is selectable.
    Failing,
    /// Acceptance criteria verified; terminal.
    Passing,
    /// Blocked on something outside the harness; sticky but revisitable.
    Blocked,
    /// Verification was inconclusive; selectable ahead of failing tasks.
    NeedsReview,
    /// Explicitly marked failed by the caller; sticky but revisitable.
    Failed,
    /// Removed from stats and selection; terminal.
    Deprecated,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Failing
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failing => "failing",
            Self::Passing => "passing",
            Self::Blocked => "blocked",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
            Self::Deprecated => "deprecated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "failing" => Some(Self::Failing),
            "passing" => Some(Self::Passing),
            "blocked" => Some(Self::Blocked),
            "needs_review" | "needs-review" => Some(Self::NeedsReview),
            "failed" => Some(Self::Failed),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }

    /// Whether the selector may pick a task in this status.
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::NeedsReview | Self::Failing)
    }

    /// Selection rank within a partition: lower is picked first.
    pub fn selection_rank(&self) -> u8 {
        match self {
            Self::NeedsReview => 0,
            Self::Failing => 1,
            _ => u8::MAX,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passing | Self::Deprecated)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskOrigin {
    /// Created or edited by hand.
    Manual,
    /// Seeded by a spec-driven workflow.
    SpecWorkflow,
    /// Any other origin, preserved verbatim.
    Other(String),
}

impl Default for TaskOrigin {
    fn default() -> Self {
        Self::Manual
    }
}

impl From<String> for TaskOrigin {
    fn from(s: String) -> Self {
        match s.as_str() {
            "manual" => Self::Manual,
            "spec-workflow" => Self::SpecWorkflow,
            _ => Self::Other(s),
        }
    }
}

impl From<TaskOrigin> for String {
    fn from(origin: TaskOrigin) -> Self {
        match origin {
            TaskOrigin::Manual => "manual".to_string(),
            TaskOrigin::SpecWorkflow => "spec-workflow".to_string(),
            TaskOrigin::Other(s) => s,
        }
    }
}

/// What class of work a task represents. Drives default verification
/// strategies when the task declares none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Code,
    Ops,
    Data,
    Infra,
    Manual,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Ops => "ops",
            Self::Data => "data",
            Self::Infra => "infra",
            Self::Manual => "manual",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code" => Some(Self::Code),
            "ops" => Some(Self::Ops),
            "data" => Some(Self::Data),
            "infra" => Some(Self::Infra),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Legacy nested test requirements, convertible to verification strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitTestRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e2e: Option<E2eTestRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTestRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct E2eTestRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Summary of the last verification run, written only by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub verdict: Verdict,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Cached AI-generated test guidance, keyed by the task version it was
/// generated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TddGuidance {
    pub task_version: u64,
    pub generated_at: DateTime<Utc>,
    pub content: String,
}

impl TddGuidance {
    /// Guidance is stale once the task has moved past the version it was
    /// generated for.
    pub fn is_stale_for(&self, task_version: u64) -> bool {
        self.task_version < task_version
    }
}

/// A unit of work with acceptance criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Dotted id, convention `<module>.<name>`.
    pub id: String,
    /// Owning module; first path segment under the tasks directory.
    pub module: String,
    /// Non-negative priority; lower sorts first.
    pub priority: u32,
    /// Current status.
    pub status: TaskStatus,
    /// One-line description (H1 of the task file body).
    pub description: String,
    /// Ordered acceptance criteria.
    #[serde(default)]
    pub acceptance: Vec<String>,
    /// Ids of tasks this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Ids of tasks this one supersedes.
    #[serde(default)]
    pub supersedes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Freeform notes section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub origin: TaskOrigin,
    /// Optimistic lock token; strictly increases across saves.
    pub version: u64,
    /// Glob patterns of source files whose change affects this task.
    #[serde(default)]
    pub affected_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    /// Explicit ordered verification strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_strategies: Option<Vec<VerificationStrategy>>,
    /// Legacy unit/e2e shape; converted when no explicit strategies exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_requirements: Option<TestRequirements>,
    /// Last verification summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdd_guidance: Option<TddGuidance>,
    /// Explicit storage path relative to the project root; absent means
    /// derive from id/module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Markdown body sections beyond acceptance/notes, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl Task {
    /// Create a new failing task. Module is derived from the id's first
    /// segment unless set later.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        let module = id.split('.').next().unwrap_or(&id).to_string();
        Self {
            id,
            module,
            priority: 1,
            status: TaskStatus::default(),
            description: description.into(),
            acceptance: Vec::new(),
            depends_on: Vec::new(),
            supersedes: Vec::new(),
            tags: Vec::new(),
            notes: None,
            origin: TaskOrigin::default(),
            version: 1,
            affected_by: Vec::new(),
            task_type: None,
            verification_strategies: None,
            test_requirements: None,
            verification: None,
            tdd_guidance: None,
            file_path: None,
            raw_body: None,
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Append an acceptance criterion.
    pub fn with_acceptance(mut self, criterion: impl Into<String>) -> Self {
        self.acceptance.push(criterion.into());
        self
    }

    /// Set task type.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Whether this is a BREAKDOWN (decomposition) task. The suffix match is
    /// case-insensitive.
    pub fn is_breakdown(&self) -> bool {
        id_is_breakdown(&self.id)
    }

    /// The id portion after the module prefix, used for module-derived file
    /// names. Falls back to the whole id when the module prefix is absent.
    pub fn id_suffix(&self) -> &str {
        id_suffix(&self.id, &self.module)
    }

    /// Validate structural invariants before persistence.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Task id cannot be empty".to_string());
        }
        if self.id.contains('/') || self.id.contains('\\') {
            return Err(format!("Task id cannot contain path separators: {}", self.id));
        }
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if self.depends_on.iter().any(|d| d == &self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}

/// Whether a task id marks a BREAKDOWN task (case-insensitive suffix).
pub fn id_is_breakdown(id: &str) -> bool {
    id.to_ascii_lowercase().ends_with(".breakdown")
}

/// The id portion after the module prefix.
pub fn id_suffix<'a>(id: &'a str, module: &str) -> &'a str {
    if let Some(rest) = id.strip_prefix(module) {
        if let Some(rest) = rest.strip_prefix('.') {
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    id.split_once('.').map_or(id, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            TaskStatus::Failing,
            TaskStatus::Passing,
            TaskStatus::Blocked,
            TaskStatus::NeedsReview,
            TaskStatus::Failed,
            TaskStatus::Deprecated,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("bogus"), None);
    }

    #[test]
    fn selectable_statuses() {
        assert!(TaskStatus::Failing.is_selectable());
        assert!(TaskStatus::NeedsReview.is_selectable());
        assert!(!TaskStatus::Passing.is_selectable());
        assert!(!TaskStatus::Blocked.is_selectable());
        assert!(!TaskStatus::Failed.is_selectable());
        assert!(!TaskStatus::Deprecated.is_selectable());
    }

    #[test]
    fn needs_review_ranks_before_failing() {
        assert!(TaskStatus::NeedsReview.selection_rank() < TaskStatus::Failing.selection_rank());
    }

    #[test]
    fn breakdown_suffix_is_case_insensitive() {
        assert!(id_is_breakdown("auth.BREAKDOWN"));
        assert!(id_is_breakdown("auth.breakdown"));
        assert!(id_is_breakdown("auth.BreakDown"));
        assert!(!id_is_breakdown("auth.login"));
        assert!(!id_is_breakdown("breakdown.auth"));
    }

    #[test]
    fn id_suffix_strips_module_prefix() {
        let task = Task::new("core.hello", "Say hello");
        assert_eq!(task.module, "core");
        assert_eq!(task.id_suffix(), "hello");

        // Multi-dot suffix keeps everything after the module.
        assert_eq!(id_suffix("core.hello.world", "core"), "hello.world");

        // Module prefix absent: fall back to first-segment split.
        assert_eq!(id_suffix("core.hello", "other"), "hello");

        // No dot at all: the whole id.
        assert_eq!(id_suffix("standalone", "standalone"), "standalone");
    }

    #[test]
    fn origin_round_trips_unknown_values() {
        let origin: TaskOrigin = String::from("imported-from-jira").into();
        assert_eq!(origin, TaskOrigin::Other("imported-from-jira".to_string()));
        let back: String = origin.into();
        assert_eq!(back, "imported-from-jira");

        let manual: TaskOrigin = String::from("manual").into();
        assert_eq!(manual, TaskOrigin::Manual);
    }

    #[test]
    fn task_validation() {
        assert!(Task::new("core.hello", "Say hello").validate().is_ok());
        assert!(Task::new("", "desc").validate().is_err());
        assert!(Task::new("core.hello", "  ").validate().is_err());
        assert!(Task::new("core/hello", "desc").validate().is_err());

        let mut cyclic = Task::new("core.hello", "Say hello");
        cyclic.depends_on.push("core.hello".to_string());
        assert!(cyclic.validate().is_err());
    }

    #[test]
    fn tdd_guidance_staleness() {
        let guidance = TddGuidance {
            task_version: 3,
            generated_at: Utc::now(),
            content: "write the failing test first".to_string(),
        };
        assert!(!guidance.is_stale_for(3));
        assert!(guidance.is_stale_for(4));
    }
}
