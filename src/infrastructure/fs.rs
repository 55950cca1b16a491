//! Filesystem primitives: atomic writes and project-root confinement.

use std::path::{Component, Path, PathBuf};

use crate::domain::{ForemanError, ForemanResult};

/// Write a file atomically: write to a temp sibling, then rename into
/// place. Concurrent readers see either the old or the new content,
/// never a torn write.
pub fn atomic_write(path: &Path, contents: &[u8]) -> ForemanResult<()> {
    let parent = path.parent().ok_or_else(|| {
        ForemanError::Configuration(format!("path has no parent: {}", path.display()))
    })?;
    std::fs::create_dir_all(parent)?;

    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned()),
        std::process::id()
    ));
    std::fs::write(&tmp, contents)?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

/// Resolve a path against the project root and verify it stays inside.
///
/// Rejects `..` ascent past the root and absolute paths pointing outside.
/// The check is lexical (no symlink resolution) and case-insensitive on
/// windows, matching how the rest of the harness compares paths.
pub fn confine_to_root(root: &Path, candidate: &Path) -> ForemanResult<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let normalized = normalize(&joined);
    let root_normalized = normalize(root);

    if is_under(&root_normalized, &normalized) {
        Ok(normalized)
    } else {
        Err(ForemanError::CwdOutsideProject { path: normalized })
    }
}

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the start leaves the ascent visible so the
                // containment check fails.
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_under(root: &Path, candidate: &Path) -> bool {
    let root_parts: Vec<String> = components_for_compare(root);
    let cand_parts: Vec<String> = components_for_compare(candidate);
    if cand_parts.len() < root_parts.len() {
        return false;
    }
    root_parts
        .iter()
        .zip(cand_parts.iter())
        .all(|(a, b)| a == b)
}

fn components_for_compare(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| {
            let s = c.as_os_str().to_string_lossy().into_owned();
            if cfg!(windows) {
                s.to_lowercase()
            } else {
                s
            }
        })
        .collect()
}
