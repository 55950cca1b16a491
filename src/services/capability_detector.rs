//! Project capability detection.
//!
//! Two tiers: a preset pass over known config files synthesizes commands
//! with per-capability confidence; when that is weak and an agent is on
//! PATH, an AI discovery pass fills the gaps. Results are cached in
//! process memory (60 s TTL) and on disk, invalidated when the tracked
//! config files change since the recorded commit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::domain::models::{
    Capabilities, Capability, CapabilityCache, CapabilitySource, E2eCapability,
};
use crate::infrastructure::fs::atomic_write;
use crate::infrastructure::git::{has_git_dir, GitContext};
use crate::infrastructure::store::StateLayout;

use super::agent_invoker::AgentInvoker;
use super::ai_discovery;
use super::prompts::PromptLibrary;

/// Preset confidence below this triggers the AI discovery pass.
const AI_DISCOVERY_THRESHOLD: f64 = 0.7;

/// In-process memory cache TTL for repeated calls in one run.
const MEMORY_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectOptions {
    /// Skip every cache tier.
    pub force: bool,
    pub verbose: bool,
}

/// Preset detection output: the capabilities plus the config files that
/// influenced them.
pub struct PresetDetection {
    pub capabilities: Capabilities,
    pub tracked_files: Vec<String>,
}

pub struct CapabilityDetector<'a> {
    layout: &'a StateLayout,
    invoker: &'a AgentInvoker,
    prompts: &'a PromptLibrary,
}

impl<'a> CapabilityDetector<'a> {
    pub fn new(
        layout: &'a StateLayout,
        invoker: &'a AgentInvoker,
        prompts: &'a PromptLibrary,
    ) -> Self {
        Self {
            layout,
            invoker,
            prompts,
        }
    }

    /// Detect capabilities for the project, cache-first.
    ///
    /// Detection never fails: a project with nothing recognizable yields
    /// all-unavailable capabilities and callers degrade gracefully.
    pub async fn detect(&self, options: DetectOptions) -> Capabilities {
        let root = self.layout.project_root().to_path_buf();

        if !options.force {
            if let Some(cached) = memory_cache_get(&root) {
                tracing::debug!("capabilities served from memory cache");
                return cached;
            }
            if let Some(cached) = self.fresh_disk_cache().await {
                memory_cache_put(&root, cached.clone());
                return cached;
            }
        }

        let preset = preset_detect(&root);
        let mut capabilities = preset.capabilities;

        if weakest_confidence(&capabilities) < AI_DISCOVERY_THRESHOLD
            && self.invoker.has_agent().await
        {
            if options.verbose {
                tracing::info!("preset confidence low, asking an agent");
            }
            if let Some(discovered) =
                ai_discovery::discover(self.invoker, self.prompts, &root).await
            {
                ai_discovery::merge(&mut capabilities, discovered, AI_DISCOVERY_THRESHOLD);
            }
        }

        self.save_disk_cache(&capabilities, &preset.tracked_files)
            .await;
        memory_cache_put(&root, capabilities.clone());
        capabilities
    }

    /// Load the disk cache if its staleness rules pass: stale when no
    /// commit hash was recorded, or when any tracked file changed since.
    async fn fresh_disk_cache(&self) -> Option<Capabilities> {
        let path = self.layout.capabilities_path();
        let content = std::fs::read_to_string(&path).ok()?;
        let cache: CapabilityCache = serde_json::from_str(&content).ok()?;

        let Some(ref commit) = cache.commit_hash else {
            tracing::debug!("capability cache has no commit hash, stale");
            return None;
        };

        let git = GitContext::new(self.layout.project_root());
        if git.paths_changed_since(commit, &cache.tracked_files).await {
            tracing::debug!("tracked config files changed, capability cache stale");
            return None;
        }

        let mut capabilities = cache.capabilities;
        capabilities.source = CapabilitySource::Cached;
        Some(capabilities)
    }

    async fn save_disk_cache(&self, capabilities: &Capabilities, tracked_files: &[String]) {
        let git = GitContext::new(self.layout.project_root());
        let cache = CapabilityCache {
            version: CapabilityCache::CURRENT_VERSION,
            capabilities: capabilities.clone(),
            commit_hash: git.current_commit().await,
            tracked_files: tracked_files.to_vec(),
        };
        match serde_json::to_string_pretty(&cache) {
            Ok(json) => {
                if let Err(err) = atomic_write(&self.layout.capabilities_path(), json.as_bytes()) {
                    tracing::warn!(error = %err, "failed to write capability cache");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize capability cache"),
        }
    }
}

fn weakest_confidence(capabilities: &Capabilities) -> f64 {
    [
        &capabilities.test,
        &capabilities.type_check,
        &capabilities.lint,
        &capabilities.build,
    ]
    .iter()
    .map(|c| if c.available { c.confidence } else { 0.0 })
    .fold(f64::MAX, f64::min)
}

// ---------------------------------------------------------------------------
// Memory cache
// ---------------------------------------------------------------------------

type MemoryCache = Mutex<HashMap<PathBuf, (Instant, Capabilities)>>;

fn memory_cache() -> &'static MemoryCache {
    static CACHE: OnceLock<MemoryCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn memory_cache_get(root: &Path) -> Option<Capabilities> {
    let cache = memory_cache().lock().ok()?;
    let (at, capabilities) = cache.get(root)?;
    (at.elapsed() < MEMORY_TTL).then(|| capabilities.clone())
}

fn memory_cache_put(root: &Path, capabilities: Capabilities) {
    if let Ok(mut cache) = memory_cache().lock() {
        cache.insert(root.to_path_buf(), (Instant::now(), capabilities));
    }
}

// ---------------------------------------------------------------------------
// Preset detection
// ---------------------------------------------------------------------------

/// Inspect known config files and synthesize commands.
pub fn preset_detect(root: &Path) -> PresetDetection {
    let mut caps = Capabilities::none();
    let mut tracked: Vec<String> = Vec::new();
    let mut track = |name: &str, tracked: &mut Vec<String>| {
        if !tracked.iter().any(|t| t == name) {
            tracked.push(name.to_string());
        }
    };

    // Rust
    if root.join("Cargo.toml").exists() {
        track("Cargo.toml", &mut tracked);
        caps.languages.push("rust".to_string());
        caps.test = Capability::detected("cargo test", 0.9);
        caps.build = Capability::detected("cargo build", 0.9);
        caps.type_check = Capability::detected("cargo check", 0.9);
        caps.lint = Capability::detected("cargo clippy -- -D warnings", 0.8);
    }

    // Node
    if let Ok(manifest) = std::fs::read_to_string(root.join("package.json")) {
        track("package.json", &mut tracked);
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&manifest) {
            detect_node(root, &json, &mut caps, &mut tracked, &mut track);
        }
    }

    // Python
    let pyproject = root.join("pyproject.toml");
    if pyproject.exists() || root.join("pytest.ini").exists() || root.join("setup.py").exists() {
        for name in ["pyproject.toml", "pytest.ini", "setup.py"] {
            if root.join(name).exists() {
                track(name, &mut tracked);
            }
        }
        caps.languages.push("python".to_string());
        if !caps.test.available {
            caps.test = Capability::detected("pytest", 0.8);
        }
        let pyproject_text = std::fs::read_to_string(&pyproject).unwrap_or_default();
        if !caps.lint.available && (root.join("ruff.toml").exists() || pyproject_text.contains("[tool.ruff]")) {
            caps.lint = Capability::detected("ruff check .", 0.8);
        }
        if !caps.type_check.available
            && (root.join("mypy.ini").exists() || pyproject_text.contains("[tool.mypy]"))
        {
            caps.type_check = Capability::detected("mypy .", 0.8);
        }
    }

    // Go
    if root.join("go.mod").exists() {
        track("go.mod", &mut tracked);
        caps.languages.push("go".to_string());
        if !caps.test.available {
            caps.test = Capability::detected("go test ./...", 0.9);
        }
        if !caps.build.available {
            caps.build = Capability::detected("go build ./...", 0.9);
        }
        if !caps.type_check.available {
            caps.type_check = Capability::detected("go vet ./...", 0.8);
        }
    }

    // Makefile fallback for the test command only.
    if !caps.test.available {
        if let Ok(makefile) = std::fs::read_to_string(root.join("Makefile")) {
            if makefile.lines().any(|l| l.starts_with("test:")) {
                track("Makefile", &mut tracked);
                caps.test = Capability::detected("make test", 0.5);
            }
        }
    }

    caps.git = if has_git_dir(root) {
        Capability::detected("git", 1.0)
    } else {
        Capability::absent()
    };

    caps.source = CapabilitySource::Preset;
    caps.confidence = aggregate_confidence(&caps);
    caps.detected_at = Utc::now();

    PresetDetection {
        capabilities: caps,
        tracked_files: tracked,
    }
}

fn detect_node<F>(
    root: &Path,
    manifest: &serde_json::Value,
    caps: &mut Capabilities,
    tracked: &mut Vec<String>,
    track: &mut F,
) where
    F: FnMut(&str, &mut Vec<String>),
{
    caps.languages.push("javascript".to_string());

    let scripts = manifest.get("scripts").and_then(|s| s.as_object());
    let has_dev_dep = |name: &str| -> bool {
        ["devDependencies", "dependencies"].iter().any(|key| {
            manifest
                .get(*key)
                .and_then(|d| d.as_object())
                .is_some_and(|deps| deps.contains_key(name))
        })
    };

    // Test command: an explicit script wins; otherwise a known framework.
    let test_script = scripts
        .and_then(|s| s.get("test"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.contains("no test specified"));
    if test_script.is_some() {
        caps.test = Capability::detected("npm test", 0.9);
    } else if has_dev_dep("vitest") {
        caps.test = Capability::detected("npx vitest run", 0.8);
    } else if has_dev_dep("jest") {
        caps.test = Capability::detected("npx jest", 0.8);
    } else if has_dev_dep("mocha") {
        caps.test = Capability::detected("npx mocha", 0.7);
    }

    if has_dev_dep("typescript") || root.join("tsconfig.json").exists() {
        if root.join("tsconfig.json").exists() {
            track("tsconfig.json", tracked);
        }
        caps.languages.push("typescript".to_string());
        caps.type_check = Capability::detected("npx tsc --noEmit", 0.9);
    }

    if has_dev_dep("eslint") {
        caps.lint = Capability::detected("npx eslint .", 0.8);
    }

    if scripts.is_some_and(|s| s.contains_key("build")) {
        caps.build = Capability::detected("npm run build", 0.8);
    }

    // E2E frameworks carry per-framework filter templates; `--grep {tag}`
    // is the default.
    let e2e = if has_dev_dep("@playwright/test") || has_dev_dep("playwright") {
        Some(E2eCapability {
            available: true,
            framework: Some("playwright".to_string()),
            command: Some("npx playwright test".to_string()),
            grep_template: Some("--grep {tag}".to_string()),
            file_template: Some("{files}".to_string()),
        })
    } else if has_dev_dep("cypress") {
        Some(E2eCapability {
            available: true,
            framework: Some("cypress".to_string()),
            command: Some("npx cypress run".to_string()),
            grep_template: Some("--env grepTags={tag}".to_string()),
            file_template: Some("--spec {files}".to_string()),
        })
    } else if has_dev_dep("puppeteer") {
        Some(E2eCapability {
            available: true,
            framework: Some("puppeteer".to_string()),
            command: scripts
                .and_then(|s| s.get("e2e"))
                .and_then(|v| v.as_str())
                .map(|_| "npm run e2e".to_string()),
            grep_template: Some("--grep {tag}".to_string()),
            file_template: None,
        })
    } else {
        None
    };
    if e2e.is_some() {
        caps.e2e = e2e;
    }
}

fn aggregate_confidence(caps: &Capabilities) -> f64 {
    let mut values: Vec<f64> = Vec::new();
    for cap in [&caps.test, &caps.type_check, &caps.lint, &caps.build] {
        if cap.available {
            values.push(cap.confidence);
        }
    }
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
