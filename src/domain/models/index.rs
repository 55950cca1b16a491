//! The task index: the compact map scanned for selection and stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// Thin per-task entry. The index is the unique source for scans; full task
/// files are only loaded for the selected winner or batch operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub status: TaskStatus,
    pub priority: u32,
    pub module: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// The on-disk index at `ai/tasks/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIndex {
    /// Optimistic lock token for the index itself.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub features: BTreeMap<String, IndexEntry>,
    /// Version observed when this process loaded the index; compared on
    /// save to detect races with concurrent invocations. Never persisted.
    #[serde(skip)]
    pub loaded_version: Option<u64>,
}

impl TaskIndex {
    pub fn empty() -> Self {
        Self {
            version: 1,
            updated_at: Utc::now(),
            metadata: BTreeMap::new(),
            features: BTreeMap::new(),
            loaded_version: None,
        }
    }

    /// Entries visible to selection and stats (deprecated excluded).
    pub fn visible_entries(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.features
            .iter()
            .filter(|(_, e)| e.status != TaskStatus::Deprecated)
    }

    /// Compute stats over the index, excluding deprecated tasks.
    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats::default();
        for (_, entry) in self.visible_entries() {
            stats.total += 1;
            match entry.status {
                TaskStatus::Failing => stats.failing += 1,
                TaskStatus::Passing => stats.passing += 1,
                TaskStatus::Blocked => stats.blocked += 1,
                TaskStatus::NeedsReview => stats.needs_review += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Deprecated => {}
            }
        }
        stats
    }
}

/// Counts by status, computed from the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub failing: usize,
    pub passing: usize,
    pub blocked: usize,
    pub needs_review: usize,
    pub failed: usize,
}

impl TaskStats {
    /// Completion percentage over visible tasks.
    pub fn percent_passing(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.passing as f64 / self.total as f64 * 100.0
        }
    }
}
