//! One-shot migration from the legacy single-file task list.
//!
//! When `feature_list.json` exists and no index does, every legacy record
//! becomes a per-task file, the index is constructed, and the legacy file
//! is renamed to a `.bak` sibling. Running again is a no-op. Per-task
//! failures are reported but do not abort the batch.

use serde::Deserialize;

use crate::domain::models::{IndexEntry, Task, TaskIndex, TaskOrigin, TaskStatus};
use crate::domain::ForemanResult;

use super::task_store::TaskStore;

/// Outcome of a migration pass.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    /// (task id, error message) for records that could not be converted.
    pub errors: Vec<(String, String)>,
}

/// One record in the legacy list. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFeature {
    id: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<u32>,
    #[serde(default)]
    acceptance: Vec<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    origin: Option<String>,
}

/// The legacy file was either a bare array or `{"features": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyList {
    Bare(Vec<LegacyFeature>),
    Wrapped { features: Vec<LegacyFeature> },
}

impl LegacyList {
    fn into_features(self) -> Vec<LegacyFeature> {
        match self {
            Self::Bare(features) | Self::Wrapped { features } => features,
        }
    }
}

/// Migrate the legacy list if present and no index exists yet. Returns
/// `None` when there is nothing to do (already migrated, or never legacy).
pub fn migrate_if_needed(store: &TaskStore) -> ForemanResult<Option<MigrationReport>> {
    let layout = store.layout();
    let legacy_path = layout.legacy_list_path();
    if !legacy_path.exists() || layout.index_path().exists() {
        return Ok(None);
    }

    tracing::info!(path = %legacy_path.display(), "migrating legacy task list");

    let content = std::fs::read_to_string(&legacy_path)?;
    let list: LegacyList = serde_json::from_str(&content)?;

    let mut report = MigrationReport::default();
    let mut index = TaskIndex::empty();

    for legacy in list.into_features() {
        let id = legacy.id.clone();
        match convert(legacy).and_then(|task| {
            store
                .save_task(&task)
                .map_err(|err| err.to_string())
        }) {
            Ok(saved) => {
                index.features.insert(
                    saved.id.clone(),
                    IndexEntry {
                        status: saved.status,
                        priority: saved.priority,
                        module: saved.module.clone(),
                        description: saved.description.clone(),
                        file_path: saved.file_path.clone(),
                    },
                );
                report.migrated += 1;
            }
            Err(message) => {
                tracing::warn!(task_id = %id, error = %message, "legacy task skipped");
                report.errors.push((id, message));
            }
        }
    }

    store.save_index(&mut index)?;

    // Retire the legacy file so the migration never re-runs.
    let bak = legacy_path.with_extension("json.bak");
    if bak.exists() {
        std::fs::remove_file(&bak)?;
    }
    std::fs::rename(&legacy_path, &bak)?;

    tracing::info!(
        migrated = report.migrated,
        errors = report.errors.len(),
        "legacy migration complete"
    );
    Ok(Some(report))
}

fn convert(legacy: LegacyFeature) -> Result<Task, String> {
    let description = legacy
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| "missing description".to_string())?;

    let mut task = Task::new(legacy.id, description);
    if let Some(module) = legacy.module {
        task.module = module;
    }
    if let Some(status) = legacy.status {
        task.status = TaskStatus::from_str(&status)
            .ok_or_else(|| format!("unknown status: {status}"))?;
    }
    if let Some(priority) = legacy.priority {
        task.priority = priority;
    }
    task.acceptance = legacy.acceptance;
    task.depends_on = legacy.depends_on;
    task.tags = legacy.tags;
    task.notes = legacy.notes.filter(|n| !n.trim().is_empty());
    if let Some(origin) = legacy.origin {
        task.origin = TaskOrigin::from(origin);
    }
    task.validate()?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RetryConfig;
    use crate::infrastructure::store::paths::StateLayout;

    fn store_in(dir: &std::path::Path) -> TaskStore {
        TaskStore::new(StateLayout::new(dir, "ai"), RetryConfig::default())
    }

    fn write_legacy(dir: &std::path::Path, json: &str) {
        let path = dir.join("ai/feature_list.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn migrates_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        write_legacy(
            dir.path(),
            r#"[
                {"id": "core.hello", "description": "Say hello", "status": "failing", "priority": 1, "acceptance": ["prints hello"]},
                {"id": "auth.login", "description": "Login", "status": "passing"}
            ]"#,
        );
        let store = store_in(dir.path());

        let report = migrate_if_needed(&store).unwrap().expect("should migrate");
        assert_eq!(report.migrated, 2);
        assert!(report.errors.is_empty());

        let index = store.load_index().unwrap();
        assert_eq!(index.features.len(), 2);
        assert_eq!(
            index.features.get("auth.login").unwrap().status,
            TaskStatus::Passing
        );

        let task = store.load_task("core.hello").unwrap().unwrap();
        assert_eq!(task.acceptance, vec!["prints hello"]);

        // Legacy file retired next to its .bak sibling.
        assert!(!dir.path().join("ai/feature_list.json").exists());
        assert!(dir.path().join("ai/feature_list.json.bak").exists());
    }

    #[test]
    fn migration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_legacy(dir.path(), r#"[{"id": "a.b", "description": "B"}]"#);
        let store = store_in(dir.path());

        assert!(migrate_if_needed(&store).unwrap().is_some());
        // Second run: index exists, nothing to do even if a legacy file
        // reappeared.
        write_legacy(dir.path(), r#"[{"id": "c.d", "description": "D"}]"#);
        assert!(migrate_if_needed(&store).unwrap().is_none());
    }

    #[test]
    fn partial_failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_legacy(
            dir.path(),
            r#"[
                {"id": "good.one", "description": "Fine"},
                {"id": "bad.one", "description": ""},
                {"id": "bad.two", "description": "Bad status", "status": "exploded"}
            ]"#,
        );
        let store = store_in(dir.path());

        let report = migrate_if_needed(&store).unwrap().unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|(id, _)| id == "bad.one"));
        assert!(store.load_task("good.one").unwrap().is_some());
    }

    #[test]
    fn wrapped_shape_accepted() {
        let dir = tempfile::tempdir().unwrap();
        write_legacy(
            dir.path(),
            r#"{"features": [{"id": "x.y", "description": "Y"}]}"#,
        );
        let store = store_in(dir.path());
        let report = migrate_if_needed(&store).unwrap().unwrap();
        assert_eq!(report.migrated, 1);
    }

    #[test]
    fn no_legacy_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(migrate_if_needed(&store).unwrap().is_none());
    }
}
