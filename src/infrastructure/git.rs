//! Git helpers.
//!
//! Everything here degrades: a missing git binary or a non-repository
//! directory yields `None`/empty results, never an error, because the
//! harness must keep working in unversioned trees.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Thin wrapper over the git CLI rooted at a project directory.
#[derive(Debug, Clone)]
pub struct GitContext {
    cwd: PathBuf,
}

impl GitContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Whether the directory is inside a git work tree.
    pub async fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .await
            .is_some_and(|out| out.trim() == "true")
    }

    /// Current HEAD commit hash.
    pub async fn current_commit(&self) -> Option<String> {
        self.run(&["rev-parse", "HEAD"])
            .await
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Files changed relative to HEAD, including untracked files.
    pub async fn changed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();

        if let Some(out) = self.run(&["diff", "--name-only", "HEAD"]).await {
            files.extend(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));
        }

        if let Some(out) = self
            .run(&["ls-files", "--others", "--exclude-standard"])
            .await
        {
            for line in out.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if !files.iter().any(|f| f == line) {
                    files.push(line.to_string());
                }
            }
        }

        files
    }

    /// Whether any of the given tracked paths changed since a commit.
    pub async fn paths_changed_since(&self, commit: &str, paths: &[String]) -> bool {
        if paths.is_empty() {
            return false;
        }
        let mut args: Vec<&str> = vec!["diff", "--name-only", commit, "--"];
        args.extend(paths.iter().map(String::as_str));
        match self.run(&args).await {
            Some(out) => out.lines().any(|l| !l.trim().is_empty()),
            // Unable to diff (e.g. commit gone after a rebase): treat as
            // changed so stale caches get refreshed.
            None => true,
        }
    }

    async fn run(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .ok()?;

        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            tracing::debug!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git command failed"
            );
            None
        }
    }
}

/// Probe whether a `.git` directory exists without spawning git, used by
/// capability presets.
pub fn has_git_dir(root: &Path) -> bool {
    root.join(".git").exists()
}
