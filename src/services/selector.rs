//! Next-task selection over the index.
//!
//! BREAKDOWN tasks decompose a module into implementation tasks; while any
//! is selectable it blocks every implementation candidate from being
//! picked first.

use crate::domain::models::{Task, TaskIndex};
use crate::domain::ForemanResult;
use crate::infrastructure::store::{synthesize_task, TaskStore};

/// Annotation emitted when BREAKDOWN tasks are shadowing implementation
/// candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedBy {
    /// Ids of all selectable BREAKDOWN tasks.
    pub ids: Vec<String>,
}

impl BlockedBy {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

/// Result of a selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub task: Option<Task>,
    pub blocked_by: Option<BlockedBy>,
}

/// Pick the next task to attempt.
///
/// Over the index only: filter to selectable statuses, partition on the
/// BREAKDOWN suffix, prefer the BREAKDOWN partition, then order by status
/// rank (needs_review before failing) and ascending priority. The winner's
/// full task is loaded; a missing file synthesizes a minimal task from the
/// index entry so selection never fails on that alone.
pub fn select_next(store: &TaskStore, index: &TaskIndex) -> ForemanResult<Selection> {
    let mut breakdowns: Vec<Candidate<'_>> = Vec::new();
    let mut implementations: Vec<Candidate<'_>> = Vec::new();

    for (id, entry) in index.visible_entries() {
        if !entry.status.is_selectable() {
            continue;
        }
        let candidate = Candidate { id, entry };
        if crate::domain::models::task::id_is_breakdown(id) {
            breakdowns.push(candidate);
        } else {
            implementations.push(candidate);
        }
    }

    let blocked_by = if !breakdowns.is_empty() && !implementations.is_empty() {
        let mut ids: Vec<String> = breakdowns.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        Some(BlockedBy { ids })
    } else {
        None
    };

    let mut pool = if breakdowns.is_empty() {
        implementations
    } else {
        breakdowns
    };

    pool.sort_by(|a, b| {
        a.entry
            .status
            .selection_rank()
            .cmp(&b.entry.status.selection_rank())
            .then(a.entry.priority.cmp(&b.entry.priority))
            .then(a.id.cmp(b.id))
    });

    let Some(winner) = pool.first() else {
        return Ok(Selection {
            task: None,
            blocked_by: None,
        });
    };

    let task = match store.load_task_with_entry(winner.id, Some(winner.entry))? {
        Some(task) => task,
        None => {
            tracing::warn!(
                task_id = %winner.id,
                "task file missing, synthesizing from index entry"
            );
            synthesize_task(winner.id, winner.entry)
        }
    };

    Ok(Selection {
        task: Some(task),
        blocked_by,
    })
}

struct Candidate<'a> {
    id: &'a String,
    entry: &'a crate::domain::models::IndexEntry,
}
