//! Detected project capabilities: the build/test/lint/type-check/e2e
//! commands the verification pipeline drives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the capabilities were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilitySource {
    /// Synthesized from known config files and paths.
    Preset,
    /// Filled in by an agent's structured discovery answer.
    AiDiscovered,
    /// Loaded from the on-disk cache.
    Cached,
}

/// One detected capability with its invocation command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl Capability {
    pub fn detected(command: impl Into<String>, confidence: f64) -> Self {
        Self {
            available: true,
            command: Some(command.into()),
            confidence,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}

/// E2E capability with per-framework filter templates. Templates carry a
/// `{tag}` / `{files}` placeholder substituted at execution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct E2eCapability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grep_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_template: Option<String>,
}

/// The full capability set for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub test: Capability,
    pub type_check: Capability,
    pub lint: Capability,
    pub build: Capability,
    pub git: Capability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e2e: Option<E2eCapability>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub source: CapabilitySource,
    /// Aggregate confidence over the detected capabilities.
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

impl Capabilities {
    /// The degraded result when detection fails entirely: everything
    /// unavailable, callers degrade gracefully.
    pub fn none() -> Self {
        Self {
            test: Capability::absent(),
            type_check: Capability::absent(),
            lint: Capability::absent(),
            build: Capability::absent(),
            git: Capability::absent(),
            e2e: None,
            languages: Vec::new(),
            source: CapabilitySource::Preset,
            confidence: 0.0,
            detected_at: Utc::now(),
        }
    }

    pub fn has_any(&self) -> bool {
        self.test.available
            || self.type_check.available
            || self.lint.available
            || self.build.available
            || self.e2e.as_ref().is_some_and(|e| e.available)
    }
}

/// On-disk cache wrapper at `ai/capabilities.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityCache {
    pub version: u32,
    pub capabilities: Capabilities,
    /// Commit at detection time; absence makes the cache stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Tracked config files whose change invalidates the cache.
    #[serde(default)]
    pub tracked_files: Vec<String>,
}

impl CapabilityCache {
    pub const CURRENT_VERSION: u32 = 1;
}
