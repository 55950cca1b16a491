//! Persisted-state layout and the single task-file path resolver.

use std::path::{Path, PathBuf};

/// All paths the harness persists under the project's state directory.
#[derive(Debug, Clone)]
pub struct StateLayout {
    project_root: PathBuf,
    state_dir: String,
}

impl StateLayout {
    pub fn new(project_root: impl Into<PathBuf>, state_dir: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            state_dir: state_dir.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn state_root(&self) -> PathBuf {
        self.project_root.join(&self.state_dir)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.state_root().join("tasks")
    }

    pub fn index_path(&self) -> PathBuf {
        self.tasks_dir().join("index.json")
    }

    pub fn legacy_list_path(&self) -> PathBuf {
        self.state_root().join("feature_list.json")
    }

    pub fn capabilities_path(&self) -> PathBuf {
        self.state_root().join("capabilities.json")
    }

    pub fn progress_log_path(&self) -> PathBuf {
        self.state_root().join("progress.log")
    }

    pub fn verification_dir(&self) -> PathBuf {
        self.state_root().join("verification")
    }

    pub fn tdd_state_path(&self) -> PathBuf {
        self.state_root().join("tdd.json")
    }

    /// Operator-tunable prompt overrides live here.
    pub fn prompts_dir(&self) -> PathBuf {
        self.state_root().join("prompts")
    }

    /// The canonical save path: `tasks/<module>/<id-suffix>.md`. Save
    /// operations always use this derivation.
    pub fn save_path(&self, module: &str, id: &str) -> PathBuf {
        let suffix = crate::domain::models::task::id_suffix(id, module);
        self.tasks_dir()
            .join(sanitize_segment(module))
            .join(format!("{}.md", sanitize_segment(suffix)))
    }

    /// Resolve a task's file with the fixed priority order:
    /// 1. explicit `file_path`: when set, it is authoritative, and a
    ///    missing file returns `None` without trying fallbacks;
    /// 2. module-derived `<module>/<id-suffix>.md`;
    /// 3. legacy first-segment derivation;
    /// 4. directory scan matching the id in front-matter.
    pub fn resolve_task_path(
        &self,
        id: &str,
        explicit: Option<&str>,
        module: Option<&str>,
    ) -> Option<PathBuf> {
        if let Some(explicit) = explicit {
            let path = self.project_root.join(explicit);
            return path.exists().then_some(path);
        }

        if let Some(module) = module {
            let derived = self.save_path(module, id);
            if derived.exists() {
                return Some(derived);
            }
        }

        // Legacy derivation from the id's first segment.
        let first_segment = id.split('.').next().unwrap_or(id);
        let suffix = id.split_once('.').map_or(id, |(_, rest)| rest);
        let legacy = self
            .tasks_dir()
            .join(sanitize_segment(first_segment))
            .join(format!("{}.md", sanitize_segment(suffix)));
        if legacy.exists() {
            return Some(legacy);
        }

        self.scan_for_id(id)
    }

    /// Walk the tasks directory looking for a file whose front-matter id
    /// matches. O(n); callers persist discovered paths into the index so
    /// repeat lookups amortize to O(1).
    fn scan_for_id(&self, id: &str) -> Option<PathBuf> {
        let needle = format!("id: {id}");
        let mut stack = vec![self.tasks_dir()];
        while let Some(dir) = stack.pop() {
            let entries = std::fs::read_dir(&dir).ok()?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == "md") {
                    if let Ok(content) = std::fs::read_to_string(&path) {
                        if front_matter_contains(&content, &needle) {
                            return Some(path);
                        }
                    }
                }
            }
        }
        None
    }
}

/// Check only the front-matter block for the id line, so a body that quotes
/// another task's id cannot shadow it.
fn front_matter_contains(content: &str, needle: &str) -> bool {
    let content = content.replace("\r\n", "\n");
    let Some(rest) = content.strip_prefix("---\n") else {
        return false;
    };
    let block = rest.split("\n---\n").next().unwrap_or("");
    block.lines().any(|line| line.trim() == needle)
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path) -> StateLayout {
        StateLayout::new(root, "ai")
    }

    fn write_task_file(path: &Path, id: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            path,
            format!("---\nid: {id}\nmodule: core\npriority: 1\nstatus: failing\nversion: 1\n---\n\n# A task\n"),
        )
        .unwrap();
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let custom = dir.path().join("ai/tasks/custom/spot.md");
        write_task_file(&custom, "core.hello");
        // Module-derived location also exists to prove it is not consulted.
        write_task_file(&layout.save_path("core", "core.hello"), "core.hello");

        let resolved = layout
            .resolve_task_path("core.hello", Some("ai/tasks/custom/spot.md"), Some("core"))
            .unwrap();
        assert_eq!(resolved, custom);
    }

    #[test]
    fn explicit_path_missing_returns_none_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        // The module-derived file exists but must not be used.
        write_task_file(&layout.save_path("core", "core.hello"), "core.hello");

        let resolved =
            layout.resolve_task_path("core.hello", Some("ai/tasks/gone.md"), Some("core"));
        assert!(resolved.is_none());
    }

    #[test]
    fn module_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let derived = layout.save_path("auth", "auth.login");
        write_task_file(&derived, "auth.login");

        let resolved = layout
            .resolve_task_path("auth.login", None, Some("auth"))
            .unwrap();
        assert_eq!(resolved, derived);
    }

    #[test]
    fn legacy_first_segment_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        // Stored under the id's first segment, but the index says module
        // "identity"; module derivation misses, legacy hits.
        let legacy = dir.path().join("ai/tasks/auth/login.md");
        write_task_file(&legacy, "auth.login");

        let resolved = layout
            .resolve_task_path("auth.login", None, Some("identity"))
            .unwrap();
        assert_eq!(resolved, legacy);
    }

    #[test]
    fn directory_scan_matches_front_matter_id() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let stray = dir.path().join("ai/tasks/misc/renamed-by-hand.md");
        write_task_file(&stray, "auth.login");

        let resolved = layout.resolve_task_path("auth.login", None, None).unwrap();
        assert_eq!(resolved, stray);
    }

    #[test]
    fn scan_ignores_body_mentions() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let decoy = dir.path().join("ai/tasks/misc/decoy.md");
        std::fs::create_dir_all(decoy.parent().unwrap()).unwrap();
        std::fs::write(
            &decoy,
            "---\nid: misc.decoy\nmodule: misc\npriority: 1\nstatus: failing\nversion: 1\n---\n\n# Decoy\n\nid: auth.login\n",
        )
        .unwrap();

        assert!(layout.resolve_task_path("auth.login", None, None).is_none());
    }

    #[test]
    fn save_path_strips_module_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        assert_eq!(
            layout.save_path("core", "core.hello"),
            dir.path().join("ai/tasks/core/hello.md")
        );
        assert_eq!(
            layout.save_path("core", "core.hello.BREAKDOWN"),
            dir.path().join("ai/tasks/core/hello.BREAKDOWN.md")
        );
    }
}
