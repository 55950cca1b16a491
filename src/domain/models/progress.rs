//! Progress log entries.
//!
//! The progress log is append-only text; one entry per line, each
//! independently parseable so interleaved writers never corrupt readers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a progress entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressKind {
    Init,
    Step,
    Change,
    Verify,
}

impl ProgressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Step => "STEP",
            Self::Change => "CHANGE",
            Self::Verify => "VERIFY",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Self::Init),
            "STEP" => Some(Self::Step),
            "CHANGE" => Some(Self::Change),
            "VERIFY" => Some(Self::Verify),
            _ => None,
        }
    }
}

/// One append-only log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ProgressKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProgressEntry {
    pub fn new(kind: ProgressKind, summary: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            feature_id: None,
            summary: Self::flatten(&summary.into()),
            details: None,
        }
    }

    pub fn with_feature(mut self, feature_id: impl Into<String>) -> Self {
        self.feature_id = Some(feature_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(Self::flatten(&details.into()));
        self
    }

    /// Render as a single log line:
    /// `<iso-8601> [KIND] (<feature>) <summary> | <details>`.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} [{}]",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.kind.as_str()
        );
        if let Some(ref feature) = self.feature_id {
            line.push_str(&format!(" ({feature})"));
        }
        line.push(' ');
        line.push_str(&self.summary);
        if let Some(ref details) = self.details {
            line.push_str(" | ");
            line.push_str(details);
        }
        line
    }

    /// Parse a single log line. Returns None for malformed lines so one bad
    /// entry never poisons the tail reader.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end();
        let (ts_str, rest) = line.split_once(' ')?;
        let timestamp = DateTime::parse_from_rfc3339(ts_str).ok()?.with_timezone(&Utc);

        let rest = rest.strip_prefix('[')?;
        let (kind_str, rest) = rest.split_once(']')?;
        let kind = ProgressKind::from_str(kind_str)?;
        let rest = rest.strip_prefix(' ').unwrap_or(rest);

        let (feature_id, rest) = if let Some(stripped) = rest.strip_prefix('(') {
            let (feature, tail) = stripped.split_once(')')?;
            (
                Some(feature.to_string()),
                tail.strip_prefix(' ').unwrap_or(tail),
            )
        } else {
            (None, rest)
        };

        let (summary, details) = match rest.split_once(" | ") {
            Some((s, d)) => (s.to_string(), Some(d.to_string())),
            None => (rest.to_string(), None),
        };

        Some(Self {
            timestamp,
            kind,
            feature_id,
            summary,
            details,
        })
    }

    /// Newlines inside summaries/details would break line-delimited parsing.
    fn flatten(s: &str) -> String {
        s.replace(['\n', '\r'], " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_line_round_trip() {
        let entry = ProgressEntry::new(ProgressKind::Verify, "verdict pass")
            .with_feature("core.hello")
            .with_details("2 strategies, 0 failures");
        let line = entry.to_line();
        let parsed = ProgressEntry::parse_line(&line).expect("line should parse");
        assert_eq!(parsed.kind, ProgressKind::Verify);
        assert_eq!(parsed.feature_id.as_deref(), Some("core.hello"));
        assert_eq!(parsed.summary, "verdict pass");
        assert_eq!(parsed.details.as_deref(), Some("2 strategies, 0 failures"));
    }

    #[test]
    fn entry_without_feature_or_details() {
        let entry = ProgressEntry::new(ProgressKind::Init, "project initialized");
        let parsed = ProgressEntry::parse_line(&entry.to_line()).unwrap();
        assert_eq!(parsed.kind, ProgressKind::Init);
        assert_eq!(parsed.feature_id, None);
        assert_eq!(parsed.details, None);
        assert_eq!(parsed.summary, "project initialized");
    }

    #[test]
    fn multiline_summaries_are_flattened() {
        let entry = ProgressEntry::new(ProgressKind::Step, "line one\nline two");
        assert!(!entry.to_line().contains('\n'));
        assert!(ProgressEntry::parse_line(&entry.to_line()).is_some());
    }

    #[test]
    fn malformed_lines_return_none() {
        assert!(ProgressEntry::parse_line("").is_none());
        assert!(ProgressEntry::parse_line("not a log line").is_none());
        assert!(ProgressEntry::parse_line("2026-01-01T00:00:00Z [BOGUS] nope").is_none());
    }
}
