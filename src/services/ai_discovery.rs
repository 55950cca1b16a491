//! AI-backed capability discovery.
//!
//! When preset detection is weak, a bounded project context (config files,
//! directory structure, a few sampled sources) goes to an agent which
//! answers with structured JSON. The answer is validated and merged only
//! where the preset was below threshold.

use std::path::Path;

use serde::Deserialize;

use crate::domain::models::{Capabilities, Capability, CapabilitySource, E2eCapability};

use super::agent_invoker::{AgentInvoker, CallOptions};
use super::prompts::{PromptLibrary, PromptName};
use super::wire::extract_json;

/// Per-file byte cap for config content shipped in the prompt.
const CONFIG_FILE_CAP: usize = 4 * 1024;
/// Per-file byte cap for sampled sources.
const SOURCE_FILE_CAP: usize = 2 * 1024;
const MAX_CONFIG_FILES: usize = 8;
const MAX_SAMPLED_SOURCES: usize = 3;
const MAX_LISTING_ENTRIES: usize = 100;

/// A capability as reported by the agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveredCapability {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// The structured discovery answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDiscovery {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub test: Option<DiscoveredCapability>,
    #[serde(default)]
    pub type_check: Option<DiscoveredCapability>,
    #[serde(default)]
    pub lint: Option<DiscoveredCapability>,
    #[serde(default)]
    pub build: Option<DiscoveredCapability>,
    #[serde(default)]
    pub e2e: Option<DiscoveredE2e>,
    #[serde(default)]
    pub custom_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredE2e {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

/// Run the discovery pass. Returns `None` on any failure; discovery is
/// strictly best-effort.
pub async fn discover(
    invoker: &AgentInvoker,
    prompts: &PromptLibrary,
    root: &Path,
) -> Option<AiDiscovery> {
    let context = build_context(root);
    let prompt = prompts.render(
        PromptName::CapabilityDiscovery,
        &[
            ("directory_listing", context.directory_listing.as_str()),
            ("config_files", context.config_files.as_str()),
            ("sampled_sources", context.sampled_sources.as_str()),
        ],
    );

    let result = invoker
        .call_any_available_agent(&prompt, CallOptions::in_dir(root))
        .await;
    if !result.success {
        tracing::debug!(
            error = ?result.error.map(|e| e.message),
            "capability discovery agent call failed"
        );
        return None;
    }

    let json = extract_json(&result.output)?;
    match serde_json::from_str::<AiDiscovery>(&json) {
        Ok(discovery) => Some(discovery),
        Err(err) => {
            tracing::debug!(error = %err, "capability discovery answer failed validation");
            None
        }
    }
}

/// Merge a discovery answer into preset capabilities. Only capabilities
/// whose preset confidence is below the threshold are replaced.
pub fn merge(capabilities: &mut Capabilities, discovery: AiDiscovery, threshold: f64) {
    let mut merged_any = false;

    let mut merge_one = |slot: &mut Capability, found: Option<DiscoveredCapability>| {
        let preset_confidence = if slot.available { slot.confidence } else { 0.0 };
        if preset_confidence >= threshold {
            return;
        }
        let Some(found) = found else { return };
        let Some(command) = found.command.filter(|c| !c.trim().is_empty()) else {
            return;
        };
        if !found.available {
            return;
        }
        *slot = Capability {
            available: true,
            command: Some(command),
            confidence: found.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        };
        merged_any = true;
    };

    merge_one(&mut capabilities.test, discovery.test);
    merge_one(&mut capabilities.type_check, discovery.type_check);
    merge_one(&mut capabilities.lint, discovery.lint);
    merge_one(&mut capabilities.build, discovery.build);

    if capabilities.e2e.as_ref().is_none_or(|e| !e.available) {
        if let Some(e2e) = discovery.e2e {
            if e2e.available && e2e.command.is_some() {
                capabilities.e2e = Some(E2eCapability {
                    available: true,
                    framework: e2e.framework,
                    command: e2e.command,
                    grep_template: Some("--grep {tag}".to_string()),
                    file_template: None,
                });
                merged_any = true;
            }
        }
    }

    for language in discovery.languages {
        if !capabilities.languages.contains(&language) {
            capabilities.languages.push(language);
        }
    }

    if merged_any {
        capabilities.source = CapabilitySource::AiDiscovered;
    }
}

/// A bounded directory listing (two levels, 100 entries), shared with the
/// project-scan prompt.
pub fn directory_listing(root: &Path) -> String {
    let mut listing: Vec<String> = Vec::new();
    let mut sources: Vec<std::path::PathBuf> = Vec::new();
    walk(root, root, 0, &mut listing, &mut sources, &[]);
    listing.truncate(MAX_LISTING_ENTRIES);
    if listing.is_empty() {
        "(empty)".to_string()
    } else {
        listing.join("\n")
    }
}

struct DiscoveryContext {
    directory_listing: String,
    config_files: String,
    sampled_sources: String,
}

/// Collect a bounded context: directory structure two levels deep, known
/// config files, and a few sampled sources.
fn build_context(root: &Path) -> DiscoveryContext {
    const CONFIG_NAMES: &[&str] = &[
        "package.json",
        "Cargo.toml",
        "pyproject.toml",
        "go.mod",
        "tsconfig.json",
        "Makefile",
        "jest.config.js",
        "vitest.config.ts",
        "playwright.config.ts",
        "cypress.config.ts",
    ];
    const SOURCE_EXTS: &[&str] = &["rs", "ts", "tsx", "js", "py", "go"];

    let mut listing: Vec<String> = Vec::new();
    let mut sources: Vec<std::path::PathBuf> = Vec::new();
    walk(root, root, 0, &mut listing, &mut sources, SOURCE_EXTS);
    listing.truncate(MAX_LISTING_ENTRIES);

    let mut config_files = String::new();
    let mut shipped = 0;
    for name in CONFIG_NAMES {
        if shipped >= MAX_CONFIG_FILES {
            break;
        }
        if let Ok(content) = std::fs::read_to_string(root.join(name)) {
            config_files.push_str(&format!("--- {name} ---\n{}\n", cap(&content, CONFIG_FILE_CAP)));
            shipped += 1;
        }
    }
    if config_files.is_empty() {
        config_files.push_str("(none found)\n");
    }

    let mut sampled = String::new();
    for path in sources.iter().take(MAX_SAMPLED_SOURCES) {
        if let Ok(content) = std::fs::read_to_string(path) {
            let rel = path.strip_prefix(root).unwrap_or(path);
            sampled.push_str(&format!(
                "--- {} ---\n{}\n",
                rel.display(),
                cap(&content, SOURCE_FILE_CAP)
            ));
        }
    }
    if sampled.is_empty() {
        sampled.push_str("(none sampled)\n");
    }

    DiscoveryContext {
        directory_listing: if listing.is_empty() {
            "(empty)".to_string()
        } else {
            listing.join("\n")
        },
        config_files,
        sampled_sources: sampled,
    }
}

fn walk(
    root: &Path,
    dir: &Path,
    depth: usize,
    listing: &mut Vec<String>,
    sources: &mut Vec<std::path::PathBuf>,
    source_exts: &[&str],
) {
    if depth > 2 || listing.len() >= MAX_LISTING_ENTRIES {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == "node_modules" || name == "target" {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            listing.push(format!(
                "{}{}",
                rel.display(),
                if path.is_dir() { "/" } else { "" }
            ));
        }
        if path.is_dir() {
            walk(root, &path, depth + 1, listing, sources, source_exts);
        } else if path
            .extension()
            .is_some_and(|e| source_exts.contains(&e.to_string_lossy().as_ref()))
        {
            sources.push(path);
        }
    }
}

fn cap(content: &str, limit: usize) -> &str {
    if content.len() <= limit {
        return content;
    }
    let mut end = limit;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}
