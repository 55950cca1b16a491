//! Domain errors for the Agent Foreman harness.

use std::path::PathBuf;
use thiserror::Error;

/// Domain-level errors that can occur across the harness.
#[derive(Debug, Error)]
pub enum ForemanError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task index missing at {}: run `foreman init` first", path.display())]
    IndexMissing { path: PathBuf },

    #[error("Optimistic lock conflict on {id}: expected version {expected}, found {found}")]
    OptimisticLock {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unknown verification strategy kind: {0}")]
    UnknownStrategy(String),

    #[error("Working directory escapes the project root: {}", path.display())]
    CwdOutsideProject { path: PathBuf },

    #[error("Command rejected by deny list ({pattern}): {command}")]
    DangerousCommand { command: String, pattern: String },

    #[error("No coding agent available on PATH")]
    AgentUnavailable,

    #[error("Subprocess timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ForemanResult<T> = Result<T, ForemanError>;

impl ForemanError {
    /// Whether this error is an optimistic concurrency conflict that the
    /// store's retry wrapper may transparently retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::OptimisticLock { .. })
    }

    /// Whether this error represents a subprocess timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
