//! Cross-platform invocation of external coding agents.
//!
//! A priority-ordered list of agent profiles is probed on PATH; the first
//! available agent receives the prompt via stdin, a temp file, or an
//! inline argument. Failures are normalized and classified so callers can
//! retry transient ones only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::models::AgentConfig;
use crate::infrastructure::process::{run, CommandSpec, ProcessRegistry};

/// Env var overriding the agent preference order, comma-separated.
pub const PRIORITY_ENV: &str = "FOREMAN_AGENT_PRIORITY";

/// How the prompt reaches the agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDelivery {
    /// Written to standard input, which is then closed.
    Stdin,
    /// Written to a temp file passed as an `@file` argument.
    File,
    /// Included inline as the final argument.
    Argument,
}

/// A known agent configuration.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    /// Program plus fixed arguments.
    pub command: Vec<String>,
    pub delivery: PromptDelivery,
    /// Agent-specific environment overlay.
    pub env: Vec<(String, String)>,
}

impl AgentProfile {
    fn new(name: &str, command: &[&str], delivery: PromptDelivery) -> Self {
        Self {
            name: name.to_string(),
            command: command.iter().map(ToString::to_string).collect(),
            delivery,
            env: Vec::new(),
        }
    }

    /// The built-in priority order.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::new("claude", &["claude", "--print"], PromptDelivery::Stdin),
            Self::new("codex", &["codex", "exec"], PromptDelivery::Argument),
            Self::new("gemini", &["gemini", "-p"], PromptDelivery::Argument),
            Self::new(
                "aider",
                &["aider", "--yes", "--message-file"],
                PromptDelivery::File,
            ),
        ]
    }
}

/// Error classification for a failed agent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentErrorKind {
    /// The call exceeded its timeout; never classified as a test failure.
    Timeout,
    /// Network/rate-limit style failure; safe to retry.
    Transient,
    /// Anything else; retrying will not help.
    Permanent,
}

#[derive(Debug, Clone)]
pub struct AgentError {
    pub kind: AgentErrorKind,
    pub message: String,
}

/// Result of one agent call.
#[derive(Debug, Clone)]
pub struct AgentCallResult {
    pub success: bool,
    pub output: String,
    pub error: Option<AgentError>,
    pub agent_used: Option<String>,
}

impl AgentCallResult {
    /// Whether the failure is worth retrying.
    pub fn is_transient_failure(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| matches!(e.kind, AgentErrorKind::Transient | AgentErrorKind::Timeout))
    }
}

/// Options for one call.
pub struct CallOptions {
    pub cwd: Option<PathBuf>,
    /// Overrides the configured default timeout.
    pub timeout: Option<Duration>,
    /// Explicit opt-in to an unbounded call.
    pub no_timeout: bool,
    /// Extra diagnostics for this call.
    pub verbose: bool,
    /// UI hint: callers may show a spinner while the agent runs.
    pub show_progress: bool,
    /// Invoked with the chosen agent's name before spawn, so UIs can
    /// annotate spinners.
    pub on_agent_selected: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: None,
            no_timeout: false,
            verbose: false,
            show_progress: false,
            on_agent_selected: None,
        }
    }
}

impl CallOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }
}

/// Detects and invokes external agents.
pub struct AgentInvoker {
    registry: Arc<ProcessRegistry>,
    config: AgentConfig,
    profiles: Vec<AgentProfile>,
}

impl AgentInvoker {
    pub fn new(registry: Arc<ProcessRegistry>, config: AgentConfig) -> Self {
        let profiles = prioritize(AgentProfile::builtin(), &config.priority);
        Self::with_profiles(registry, config, profiles)
    }

    /// Build an invoker over an explicit profile list, bypassing the
    /// built-in set. Embedders and tests use this to control exactly
    /// which agents may be probed.
    pub fn with_profiles(
        registry: Arc<ProcessRegistry>,
        config: AgentConfig,
        profiles: Vec<AgentProfile>,
    ) -> Self {
        Self {
            registry,
            config,
            profiles,
        }
    }

    /// The profiles in effective priority order.
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    /// Probe every profile; used by the `agents` command.
    pub async fn detect_all(&self) -> Vec<(AgentProfile, bool)> {
        let mut out = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            let available = self.is_available(profile).await;
            out.push((profile.clone(), available));
        }
        out
    }

    /// The first available profile, if any.
    pub async fn first_available(&self) -> Option<AgentProfile> {
        for profile in &self.profiles {
            if self.is_available(profile).await {
                return Some(profile.clone());
            }
        }
        None
    }

    /// Whether any agent can be invoked at all.
    pub async fn has_agent(&self) -> bool {
        self.first_available().await.is_some()
    }

    async fn is_available(&self, profile: &AgentProfile) -> bool {
        let Some(program) = profile.command.first() else {
            return false;
        };
        if is_refused_binary(program) {
            tracing::warn!(agent = %profile.name, "agent profile refused: runtime binary");
            return false;
        }
        let Some(resolved) = which(&self.registry, program).await else {
            return false;
        };
        if is_refused_binary(&resolved) {
            tracing::warn!(
                agent = %profile.name,
                resolved = %resolved,
                "agent resolved to a runtime binary, refusing"
            );
            return false;
        }
        true
    }

    /// Invoke the first available agent with the given prompt.
    pub async fn call_any_available_agent(
        &self,
        prompt: &str,
        options: CallOptions,
    ) -> AgentCallResult {
        let Some(profile) = self.first_available().await else {
            return AgentCallResult {
                success: false,
                output: String::new(),
                error: Some(AgentError {
                    kind: AgentErrorKind::Permanent,
                    message: "no coding agent available on PATH".to_string(),
                }),
                agent_used: None,
            };
        };

        if let Some(ref hook) = options.on_agent_selected {
            hook(&profile.name);
        }

        self.call_agent(&profile, prompt, &options).await
    }

    async fn call_agent(
        &self,
        profile: &AgentProfile,
        prompt: &str,
        options: &CallOptions,
    ) -> AgentCallResult {
        let mut spec = CommandSpec::new(profile.command[0].clone())
            .args(profile.command[1..].iter().cloned());

        let mut prompt_file: Option<PathBuf> = None;
        match profile.delivery {
            PromptDelivery::Stdin => {
                spec = spec.stdin(prompt);
            }
            PromptDelivery::File => {
                let path = std::env::temp_dir().join(format!(
                    "foreman-prompt-{}.md",
                    uuid::Uuid::new_v4().simple()
                ));
                if let Err(err) = std::fs::write(&path, prompt) {
                    return AgentCallResult {
                        success: false,
                        output: String::new(),
                        error: Some(AgentError {
                            kind: AgentErrorKind::Permanent,
                            message: format!("failed to write prompt file: {err}"),
                        }),
                        agent_used: Some(profile.name.clone()),
                    };
                }
                spec = spec.args([format!("@{}", path.display())]);
                prompt_file = Some(path);
            }
            PromptDelivery::Argument => {
                spec = spec.args([prompt.to_string()]);
            }
        }

        if let Some(ref cwd) = options.cwd {
            spec = spec.cwd(cwd.clone());
        }
        for (key, value) in &profile.env {
            spec = spec.env(key.clone(), value.clone());
        }
        if !options.no_timeout && !self.config.no_timeout {
            let timeout = options
                .timeout
                .unwrap_or(Duration::from_secs(self.config.timeout_secs));
            spec = spec.timeout(timeout);
        }

        if options.verbose {
            tracing::info!(
                agent = %profile.name,
                prompt_bytes = prompt.len(),
                command = %spec.display(),
                "invoking agent"
            );
        } else {
            tracing::debug!(agent = %profile.name, command = %spec.display(), "invoking agent");
        }
        let outcome = run(&self.registry, &spec).await;

        if let Some(path) = prompt_file {
            let _ = std::fs::remove_file(path);
        }

        match outcome {
            Ok(out) if out.timed_out => AgentCallResult {
                success: false,
                output: out.stdout,
                error: Some(AgentError {
                    kind: AgentErrorKind::Timeout,
                    message: "agent call timed out".to_string(),
                }),
                agent_used: Some(profile.name.clone()),
            },
            Ok(out) if out.success() => AgentCallResult {
                success: true,
                output: out.stdout,
                error: None,
                agent_used: Some(profile.name.clone()),
            },
            Ok(out) => {
                let kind = classify_stderr(&out.stderr);
                AgentCallResult {
                    success: false,
                    output: out.stdout,
                    error: Some(AgentError {
                        kind,
                        message: normalize_error(&out.stderr, out.exit_code),
                    }),
                    agent_used: Some(profile.name.clone()),
                }
            }
            Err(err) => AgentCallResult {
                success: false,
                output: String::new(),
                error: Some(AgentError {
                    kind: AgentErrorKind::Permanent,
                    message: format!("failed to spawn agent: {err}"),
                }),
                agent_used: Some(profile.name.clone()),
            },
        }
    }
}

/// Reorder profiles by an explicit priority list; the env var wins over
/// config. Unlisted profiles keep their relative order after listed ones.
fn prioritize(profiles: Vec<AgentProfile>, config_priority: &[String]) -> Vec<AgentProfile> {
    let priority: Vec<String> = std::env::var(PRIORITY_ENV)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_else(|| config_priority.to_vec());

    if priority.is_empty() {
        return profiles;
    }

    let mut ordered: Vec<AgentProfile> = Vec::with_capacity(profiles.len());
    for name in &priority {
        if let Some(profile) = profiles.iter().find(|p| &p.name == name) {
            ordered.push(profile.clone());
        }
    }
    for profile in profiles {
        if !ordered.iter().any(|p| p.name == profile.name) {
            ordered.push(profile);
        }
    }
    ordered
}

/// Resolve a command on PATH via the platform's lookup tool.
async fn which(registry: &ProcessRegistry, program: &str) -> Option<String> {
    let tool = if cfg!(windows) { "where" } else { "which" };
    let spec = CommandSpec::new(tool)
        .args([program])
        .timeout(Duration::from_secs(10));
    let out = run(registry, &spec).await.ok()?;
    if !out.success() {
        return None;
    }
    out.stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(String::from)
}

/// Agents must be real coding agents; a profile that resolves to a
/// JavaScript runtime or package manager would replace the harness's own
/// tooling, so it is refused.
pub fn is_refused_binary(name_or_path: &str) -> bool {
    let normalized = name_or_path.replace('\\', "/");
    let stem = normalized
        .rsplit('/')
        .next()
        .unwrap_or(&normalized)
        .to_lowercase();
    let stem = stem.strip_suffix(".exe").unwrap_or(&stem);
    matches!(stem, "node" | "bun" | "deno" | "npm" | "pnpm" | "yarn")
}

/// Classify an agent's stderr into transient vs permanent. Text matching
/// is fragile by nature; patterns stick to unambiguous network and
/// rate-limit wording.
pub fn classify_stderr(stderr: &str) -> AgentErrorKind {
    static TRANSIENT: OnceLock<Regex> = OnceLock::new();
    let re = TRANSIENT.get_or_init(|| {
        Regex::new(
            r"(?i)(rate.?limit|too many requests|\b429\b|\b502\b|\b503\b|\b529\b|timed? ?out|etimedout|econnreset|connection reset|network error|socket hang up|service unavailable|temporarily unavailable|overloaded)",
        )
        .expect("transient pattern compiles")
    });
    if re.is_match(stderr) {
        AgentErrorKind::Transient
    } else {
        AgentErrorKind::Permanent
    }
}

fn normalize_error(stderr: &str, exit_code: Option<i32>) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        match exit_code {
            Some(code) => format!("agent exited with code {code}"),
            None => "agent terminated by signal".to_string(),
        }
    } else {
        let mut message: String = trimmed.chars().take(2000).collect();
        if trimmed.len() > message.len() {
            message.push_str(" [...]");
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_binaries() {
        assert!(is_refused_binary("node"));
        assert!(is_refused_binary("/usr/local/bin/node"));
        assert!(is_refused_binary("C:\\Program Files\\nodejs\\node.exe"));
        assert!(is_refused_binary("NPM"));
        assert!(is_refused_binary("yarn"));
        assert!(!is_refused_binary("claude"));
        assert!(!is_refused_binary("/opt/bin/codex"));
        // A name merely containing a runtime name is fine.
        assert!(!is_refused_binary("node-agent"));
    }

    #[test]
    fn transient_classification() {
        assert_eq!(
            classify_stderr("Error: rate limit exceeded, retry later"),
            AgentErrorKind::Transient
        );
        assert_eq!(
            classify_stderr("fetch failed: ECONNRESET"),
            AgentErrorKind::Transient
        );
        assert_eq!(
            classify_stderr("upstream returned 529 overloaded"),
            AgentErrorKind::Transient
        );
        assert_eq!(
            classify_stderr("request timed out after 30s"),
            AgentErrorKind::Transient
        );
        assert_eq!(
            classify_stderr("invalid API key"),
            AgentErrorKind::Permanent
        );
        assert_eq!(classify_stderr(""), AgentErrorKind::Permanent);
    }

    #[test]
    fn priority_env_overrides_builtin_order() {
        temp_env::with_var(PRIORITY_ENV, Some("gemini,claude"), || {
            let ordered = prioritize(AgentProfile::builtin(), &[]);
            assert_eq!(ordered[0].name, "gemini");
            assert_eq!(ordered[1].name, "claude");
            // Unlisted agents keep their relative order at the back.
            assert_eq!(ordered[2].name, "codex");
        });
    }

    #[test]
    fn config_priority_applies_without_env() {
        temp_env::with_var(PRIORITY_ENV, None::<&str>, || {
            let ordered = prioritize(AgentProfile::builtin(), &["aider".to_string()]);
            assert_eq!(ordered[0].name, "aider");
        });
    }

    #[test]
    fn unknown_priority_names_are_ignored() {
        temp_env::with_var(PRIORITY_ENV, Some("hal9000"), || {
            let ordered = prioritize(AgentProfile::builtin(), &[]);
            assert_eq!(ordered.len(), AgentProfile::builtin().len());
            assert_eq!(ordered[0].name, "claude");
        });
    }

    #[tokio::test]
    async fn no_agent_available_is_a_permanent_error() {
        let registry = ProcessRegistry::new();
        let config = AgentConfig::default();
        let mut invoker = AgentInvoker::new(registry, config);
        // Point every profile at a binary that cannot exist.
        invoker.profiles = vec![AgentProfile::new(
            "ghost",
            &["definitely-not-a-real-binary-4242"],
            PromptDelivery::Stdin,
        )];

        let result = invoker
            .call_any_available_agent("hello", CallOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.agent_used, None);
        assert_eq!(result.error.unwrap().kind, AgentErrorKind::Permanent);
    }

    #[tokio::test]
    async fn stdin_delivery_reaches_the_agent() {
        let registry = ProcessRegistry::new();
        let config = AgentConfig::default();
        let mut invoker = AgentInvoker::new(registry, config);
        // `cat` stands in for an agent that echoes its prompt.
        invoker.profiles = vec![AgentProfile::new("cat", &["cat"], PromptDelivery::Stdin)];

        let result = invoker
            .call_any_available_agent("the prompt", CallOptions::default())
            .await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.output, "the prompt");
        assert_eq!(result.agent_used.as_deref(), Some("cat"));
    }

    #[tokio::test]
    async fn on_agent_selected_fires_before_spawn() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let selected = Arc::new(AtomicBool::new(false));
        let selected_clone = Arc::clone(&selected);

        let registry = ProcessRegistry::new();
        let mut invoker = AgentInvoker::new(registry, AgentConfig::default());
        invoker.profiles = vec![AgentProfile::new("cat", &["cat"], PromptDelivery::Stdin)];

        let options = CallOptions {
            on_agent_selected: Some(Box::new(move |name| {
                assert_eq!(name, "cat");
                selected_clone.store(true, Ordering::SeqCst);
            })),
            ..CallOptions::default()
        };
        let result = invoker.call_any_available_agent("x", options).await;
        assert!(result.success);
        assert!(selected.load(Ordering::SeqCst));
    }
}
