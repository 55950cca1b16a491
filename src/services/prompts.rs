//! Prompt templates as data.
//!
//! The bodies live in `prompts/` and are embedded as defaults; operators
//! can override any of them by dropping a same-named file into the state
//! directory's `prompts/` folder, no recompile needed.

use std::path::PathBuf;

/// A named template with its embedded default body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptName {
    Verification,
    CapabilityDiscovery,
    TddGuidance,
    ProjectScan,
}

impl PromptName {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Verification => "verification.md",
            Self::CapabilityDiscovery => "capability_discovery.md",
            Self::TddGuidance => "tdd_guidance.md",
            Self::ProjectScan => "project_scan.md",
        }
    }

    fn default_body(&self) -> &'static str {
        match self {
            Self::Verification => include_str!("../../prompts/verification.md"),
            Self::CapabilityDiscovery => include_str!("../../prompts/capability_discovery.md"),
            Self::TddGuidance => include_str!("../../prompts/tdd_guidance.md"),
            Self::ProjectScan => include_str!("../../prompts/project_scan.md"),
        }
    }
}

/// Loads templates, preferring operator overrides on disk.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    overrides_dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(overrides_dir: impl Into<PathBuf>) -> Self {
        Self {
            overrides_dir: overrides_dir.into(),
        }
    }

    /// The template body, override-first.
    pub fn body(&self, name: PromptName) -> String {
        let override_path = self.overrides_dir.join(name.file_name());
        match std::fs::read_to_string(&override_path) {
            Ok(body) => {
                tracing::debug!(path = %override_path.display(), "using prompt override");
                body
            }
            Err(_) => name.default_body().to_string(),
        }
    }

    /// Render a template, substituting `{key}` placeholders.
    pub fn render(&self, name: PromptName, substitutions: &[(&str, &str)]) -> String {
        let mut body = self.body(name);
        for (key, value) in substitutions {
            body = body.replace(&format!("{{{key}}}"), value);
        }
        body
    }
}
