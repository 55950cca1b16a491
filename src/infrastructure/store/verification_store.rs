//! Per-run verification artifacts.
//!
//! The store consumes a result and returns a handle; it never mutates
//! tasks. Artifacts are keyed by (task id, timestamp) and there is no
//! pruning policy.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::models::VerificationResult;
use crate::domain::ForemanResult;
use crate::infrastructure::fs::atomic_write;

#[derive(Debug, Clone)]
pub struct VerificationStore {
    dir: PathBuf,
}

impl VerificationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist one run's result and return the artifact path.
    pub fn save(&self, result: &VerificationResult) -> ForemanResult<PathBuf> {
        let stamp = result.timestamp.format("%Y%m%dT%H%M%S%3fZ");
        let run = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}-{}.json", result.feature_id, stamp, &run[..8]);
        let path = self.dir.join(name);

        let json = serde_json::to_string_pretty(result)?;
        atomic_write(&path, json.as_bytes())?;
        Ok(path)
    }

    /// The most recent artifact for a task, by timestamp.
    pub fn latest_for(&self, task_id: &str) -> ForemanResult<Option<VerificationResult>> {
        let mut results = self.list_for(task_id)?;
        Ok(results.pop())
    }

    /// All artifacts for a task, oldest first. Unreadable artifacts are
    /// skipped with a warning.
    pub fn list_for(&self, task_id: &str) -> ForemanResult<Vec<VerificationResult>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut results: Vec<VerificationResult> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_artifact_for(&path, task_id) {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
            {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable verification artifact");
                }
            }
        }
        results.sort_by_key(|r| r.timestamp);
        Ok(results)
    }
}

fn is_artifact_for(path: &Path, task_id: &str) -> bool {
    if path.extension().is_none_or(|e| e != "json") {
        return false;
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .is_some_and(|name| name.starts_with(&format!("{task_id}-")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Verdict;
    use chrono::{Duration, Utc};

    fn result(feature_id: &str, verdict: Verdict, offset_secs: i64) -> VerificationResult {
        VerificationResult {
            feature_id: feature_id.to_string(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            commit_hash: None,
            changed_files: Vec::new(),
            strategies: Vec::new(),
            criteria: Vec::new(),
            verdict,
            reasoning: None,
            agent: None,
        }
    }

    #[test]
    fn save_and_read_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = VerificationStore::new(dir.path().join("verification"));

        store.save(&result("core.hello", Verdict::Fail, 0)).unwrap();
        store.save(&result("core.hello", Verdict::Pass, 60)).unwrap();
        store.save(&result("auth.login", Verdict::Fail, 30)).unwrap();

        let latest = store.latest_for("core.hello").unwrap().unwrap();
        assert_eq!(latest.verdict, Verdict::Pass);

        let all = store.list_for("core.hello").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].timestamp < all[1].timestamp);
    }

    #[test]
    fn empty_store_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = VerificationStore::new(dir.path().join("verification"));
        assert!(store.latest_for("core.hello").unwrap().is_none());
    }

    #[test]
    fn prefix_match_does_not_cross_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = VerificationStore::new(dir.path().join("verification"));
        store.save(&result("core.hello", Verdict::Pass, 0)).unwrap();
        store
            .save(&result("core.hello.world", Verdict::Fail, 0))
            .unwrap();

        // `core.hello-` prefix excludes `core.hello.world-...` artifacts.
        let all = store.list_for("core.hello").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].feature_id, "core.hello");
    }
}
