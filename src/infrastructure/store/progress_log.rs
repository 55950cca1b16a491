//! Append-only progress log.
//!
//! Entries from concurrent processes may interleave; each line is
//! independently parseable and no component rewrites prior entries.

use std::io::Write;
use std::path::PathBuf;

use crate::domain::models::ProgressEntry;
use crate::domain::ForemanResult;

#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry. The file is opened in append mode per call so
    /// concurrent invocations never clobber each other's offsets.
    pub fn append(&self, entry: &ProgressEntry) -> ForemanResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        Ok(())
    }

    /// The last `n` parseable entries, oldest first. Malformed lines are
    /// skipped, never fatal.
    pub fn tail(&self, n: usize) -> ForemanResult<Vec<ProgressEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let entries: Vec<ProgressEntry> = content
            .lines()
            .filter_map(ProgressEntry::parse_line)
            .collect();
        let skip = entries.len().saturating_sub(n);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ProgressKind;

    #[test]
    fn append_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("ai/progress.log"));

        for i in 0..5 {
            log.append(&ProgressEntry::new(ProgressKind::Step, format!("step {i}")))
                .unwrap();
        }

        let tail = log.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].summary, "step 3");
        assert_eq!(tail[1].summary, "step 4");
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("ai/progress.log"));
        assert!(log.tail(10).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.log");
        std::fs::write(&path, "garbage line\n").unwrap();

        let log = ProgressLog::new(&path);
        log.append(&ProgressEntry::new(ProgressKind::Init, "started"))
            .unwrap();

        let tail = log.tail(10).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].summary, "started");
    }

    #[test]
    fn append_never_rewrites_prior_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.log");
        let log = ProgressLog::new(&path);

        log.append(&ProgressEntry::new(ProgressKind::Init, "first"))
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();
        log.append(&ProgressEntry::new(ProgressKind::Step, "second"))
            .unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&before));
    }
}
