//! Durable task persistence with optimistic locking.
//!
//! The store exclusively owns the on-disk index and task files. Mutation
//! outside the store is forbidden; every write re-checks the on-disk
//! version after its suspension points and goes through atomic
//! write-then-rename.

use std::path::PathBuf;

use crate::domain::models::{
    IndexEntry, RetryConfig, Task, TaskIndex, TaskStats, TaskStatus, VerificationSummary,
};
use crate::domain::{ForemanError, ForemanResult};
use crate::infrastructure::fs::atomic_write;

use super::markdown;
use super::paths::StateLayout;
use super::retry::with_optimistic_retry;

/// Task CRUD over the state layout.
#[derive(Debug, Clone)]
pub struct TaskStore {
    layout: StateLayout,
    retry: RetryConfig,
}

impl TaskStore {
    pub fn new(layout: StateLayout, retry: RetryConfig) -> Self {
        Self { layout, retry }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    // -----------------------------------------------------------------
    // Index
    // -----------------------------------------------------------------

    /// Load the index. Missing index is a fatal configuration error for
    /// the quick operations built on top of this.
    pub fn load_index(&self) -> ForemanResult<TaskIndex> {
        self.try_load_index()?.ok_or_else(|| ForemanError::IndexMissing {
            path: self.layout.index_path(),
        })
    }

    /// Load the index if it exists.
    pub fn try_load_index(&self) -> ForemanResult<Option<TaskIndex>> {
        let path = self.layout.index_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut index: TaskIndex =
            serde_json::from_str(&content).map_err(|err| ForemanError::Parse {
                path,
                message: format!("corrupt index JSON: {err}"),
            })?;
        index.loaded_version = Some(index.version);
        Ok(Some(index))
    }

    /// Persist the index, bumping its version. Raises a conflict when the
    /// on-disk version moved past the one this process loaded.
    pub fn save_index(&self, index: &mut TaskIndex) -> ForemanResult<()> {
        let on_disk = self.read_index_version()?;
        let observed = index.loaded_version.unwrap_or(0);
        if let Some(disk_version) = on_disk {
            if disk_version != observed {
                return Err(ForemanError::OptimisticLock {
                    id: "index".to_string(),
                    expected: observed,
                    found: disk_version,
                });
            }
            index.version = disk_version + 1;
        }
        index.updated_at = chrono::Utc::now();
        let json = serde_json::to_string_pretty(&index)?;
        atomic_write(&self.layout.index_path(), json.as_bytes())?;
        index.loaded_version = Some(index.version);
        Ok(())
    }

    fn read_index_version(&self) -> ForemanResult<Option<u64>> {
        Ok(self.try_load_index()?.map(|index| index.version))
    }

    /// All task ids known to the index.
    pub fn list_ids(&self) -> ForemanResult<Vec<String>> {
        Ok(self.load_index()?.features.keys().cloned().collect())
    }

    /// Stats computed over the index only; deprecated tasks are invisible.
    pub fn stats_from_index(&self) -> ForemanResult<TaskStats> {
        Ok(self.load_index()?.stats())
    }

    // -----------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------

    /// Load a task by id. A missing file returns `Ok(None)`; the caller
    /// decides what that means.
    pub fn load_task(&self, id: &str) -> ForemanResult<Option<Task>> {
        let entry = self
            .try_load_index()?
            .and_then(|index| index.features.get(id).cloned());
        self.load_task_with_entry(id, entry.as_ref())
    }

    /// Load a task using an already-loaded index entry for path hints.
    pub fn load_task_with_entry(
        &self,
        id: &str,
        entry: Option<&IndexEntry>,
    ) -> ForemanResult<Option<Task>> {
        let explicit = entry.and_then(|e| e.file_path.as_deref());
        let module = entry.map(|e| e.module.as_str());
        let Some(path) = self.layout.resolve_task_path(id, explicit, module) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(&path)?;
        let mut task = markdown::parse_task(&content, &path)?;
        if task.file_path.is_none() {
            task.file_path = self.relative_to_root(&path);
        }
        Ok(Some(task))
    }

    /// Persist a task, enforcing the optimistic lock.
    ///
    /// The pre-read version travels inside `task.version`. Before writing,
    /// the store re-reads the current on-disk version; a mismatch raises a
    /// typed conflict. The written task carries `version + 1`, always at
    /// the module-derived path.
    pub fn save_task(&self, task: &Task) -> ForemanResult<Task> {
        task.validate().map_err(ForemanError::InvalidTask)?;

        let current = self.read_task_version(task)?;
        if let Some(found) = current {
            if found != task.version {
                return Err(ForemanError::OptimisticLock {
                    id: task.id.clone(),
                    expected: task.version,
                    found,
                });
            }
        }

        let path = self.layout.save_path(&task.module, &task.id);
        let mut saved = task.clone();
        saved.version = task.version + 1;
        saved.file_path = self.relative_to_root(&path);

        let content = markdown::serialize_task(&saved)?;
        atomic_write(&path, content.as_bytes())?;
        Ok(saved)
    }

    fn read_task_version(&self, task: &Task) -> ForemanResult<Option<u64>> {
        let path = self.layout.resolve_task_path(
            &task.id,
            task.file_path.as_deref(),
            Some(&task.module),
        );
        let Some(path) = path else { return Ok(None) };
        let content = std::fs::read_to_string(&path)?;
        let on_disk = markdown::parse_task(&content, &path)?;
        Ok(Some(on_disk.version))
    }

    fn relative_to_root(&self, path: &PathBuf) -> Option<String> {
        path.strip_prefix(self.layout.project_root())
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }

    // -----------------------------------------------------------------
    // Quick operations: one task file plus the index, under retry
    // -----------------------------------------------------------------

    /// Update a task's status, touching only its file and the index.
    pub async fn update_status_quick(&self, id: &str, status: TaskStatus) -> ForemanResult<Task> {
        self.update_status_quick_with_note(id, status, None).await
    }

    /// Update a task's status and append a note in the same transaction.
    pub async fn update_status_quick_with_note(
        &self,
        id: &str,
        status: TaskStatus,
        note: Option<String>,
    ) -> ForemanResult<Task> {
        self.quick_mutation(id, move |task| {
            task.status = status;
            if let Some(ref note) = note {
                task.notes = Some(match task.notes.take() {
                    Some(existing) => format!("{existing}\n\n{note}"),
                    None => note.clone(),
                });
            }
        })
        .await
    }

    /// Record a verification summary. Only the strategy-composed pipeline
    /// may call this; callers must not fabricate verdicts.
    pub async fn update_verification_quick(
        &self,
        id: &str,
        summary: VerificationSummary,
    ) -> ForemanResult<Task> {
        self.quick_mutation(id, move |task| {
            task.verification = Some(summary.clone());
        })
        .await
    }

    /// Cache AI-generated TDD guidance on a task. The guidance is keyed
    /// by the version the save is about to write, so it stays fresh until
    /// the task next changes.
    pub async fn update_tdd_guidance_quick(
        &self,
        id: &str,
        content: String,
    ) -> ForemanResult<Task> {
        self.quick_mutation(id, move |task| {
            task.tdd_guidance = Some(crate::domain::models::TddGuidance {
                task_version: task.version + 1,
                generated_at: chrono::Utc::now(),
                content: content.clone(),
            });
        })
        .await
    }

    /// Run a single-task mutation under the optimistic retry wrapper. Each
    /// attempt re-loads both the index and the task so a lost race starts
    /// over from fresh state.
    async fn quick_mutation<F>(&self, id: &str, mutate: F) -> ForemanResult<Task>
    where
        F: Fn(&mut Task) + Clone,
    {
        with_optimistic_retry(self.retry, || {
            let mutate = mutate.clone();
            async move {
                let mut index = self.load_index()?;
                let entry = index.features.get(id).cloned();
                let mut task = match self.load_task_with_entry(id, entry.as_ref())? {
                    Some(task) => task,
                    // Index knows the task but the file is gone: synthesize
                    // a minimal task so the mutation can recreate it.
                    None => match entry.as_ref() {
                        Some(entry) => synthesize_task(id, entry),
                        None => return Err(ForemanError::TaskNotFound(id.to_string())),
                    },
                };

                mutate(&mut task);
                let saved = self.save_task(&task)?;

                index.features.insert(
                    id.to_string(),
                    IndexEntry {
                        status: saved.status,
                        priority: saved.priority,
                        module: saved.module.clone(),
                        description: saved.description.clone(),
                        file_path: saved.file_path.clone(),
                    },
                );
                self.save_index(&mut index)?;
                Ok(saved)
            }
        })
        .await
    }
}

/// Build a minimal task from a thin index entry. Used when a task file has
/// gone missing; selection and quick mutations never fail on that alone.
pub fn synthesize_task(id: &str, entry: &IndexEntry) -> Task {
    let mut task = Task::new(id, entry.description.clone());
    task.module = entry.module.clone();
    task.priority = entry.priority;
    task.status = entry.status;
    task
}
