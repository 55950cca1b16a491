//! Harness configuration, loaded hierarchically via figment.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForemanConfig {
    /// Directory holding all persisted harness state, relative to the
    /// project root.
    pub state_dir: String,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub agent: AgentConfig,
    pub verify: VerifyConfig,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            state_dir: "ai".to_string(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
            agent: AgentConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

/// Optimistic-lock retry policy for store mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
        }
    }
}

/// Agent invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Preferred agent order; empty means the built-in order. The
    /// `FOREMAN_AGENT_PRIORITY` env var overrides this.
    pub priority: Vec<String>,
    /// Default timeout for agent calls, seconds.
    pub timeout_secs: u64,
    /// Explicit opt-in to unbounded agent calls.
    pub no_timeout: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            timeout_secs: 300,
            no_timeout: false,
        }
    }
}

/// Verification run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// E2E subprocess timeout, seconds.
    pub e2e_timeout_secs: u64,
    /// Run automated checks in parallel (E2E still strictly after the
    /// unit layer).
    pub parallel_checks: bool,
    /// Max attempts for transient agent errors at the AI boundary.
    pub transient_retries: u32,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            e2e_timeout_secs: 120,
            parallel_checks: false,
            transient_retries: 3,
        }
    }
}
