//! Verification strategy declarations.
//!
//! A strategy is a declarative description of one verification mechanism.
//! The `type` tag selects the variant; executors dispatch on it through the
//! strategy registry with exhaustive matching.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Options every strategy may declare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCommon {
    /// A required strategy that fails forces the overall verdict to fail.
    /// Optional strategies that fail are rendered as skipped.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Per-strategy timeout in seconds.
    #[serde(
        default,
        rename = "timeout",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_secs: Option<u64>,
    /// Retries applied only to transient failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Environment overlay for spawned processes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl StrategyCommon {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn optional() -> Self {
        Self {
            required: false,
            ..Self::default()
        }
    }
}

/// Expected exit code for script/command strategies: a scalar or a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExitExpectation {
    Code(i32),
    AnyOf(Vec<i32>),
}

impl Default for ExitExpectation {
    fn default() -> Self {
        Self::Code(0)
    }
}

impl ExitExpectation {
    pub fn matches(&self, code: i32) -> bool {
        match self {
            Self::Code(expected) => *expected == code,
            Self::AnyOf(set) => set.contains(&code),
        }
    }
}

/// Composite operator. The `logic` field name is accepted as an alias on
/// the composite variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOperator {
    And,
    Or,
}

/// One verification mechanism, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum VerificationStrategy {
    /// Run the detected unit-test command, optionally restricted.
    Test {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        cases: Vec<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Run the detected E2E command with pattern/tag filters.
    E2e {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Execute a project-relative script and compare its exit code.
    Script {
        path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default)]
        expect_exit: ExitExpectation,
        /// Working directory, validated to stay inside the project root.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Issue an HTTP request and compare status and optionally body.
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_pattern: Option<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Assert on a path's existence, content, and size.
    File {
        path: String,
        #[serde(default = "default_true")]
        exists: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_bytes: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_bytes: Option<u64>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Run an allow-listed command.
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default)]
        expect_exit: ExitExpectation,
        /// Working directory, validated to stay inside the project root.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Never passes automatically; surfaces instructions for a human.
    Manual {
        instructions: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        checklist: Vec<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Delegate to an agent with a structured exploration prompt.
    Ai {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus: Option<String>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
    /// Nest strategies under an and/or operator.
    Composite {
        #[serde(alias = "logic")]
        operator: CompositeOperator,
        strategies: Vec<VerificationStrategy>,
        #[serde(flatten)]
        common: StrategyCommon,
    },
}

fn default_expect_status() -> u16 {
    200
}

impl VerificationStrategy {
    /// The registry key for this strategy.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Test { .. } => "test",
            Self::E2e { .. } => "e2e",
            Self::Script { .. } => "script",
            Self::Http { .. } => "http",
            Self::File { .. } => "file",
            Self::Command { .. } => "command",
            Self::Manual { .. } => "manual",
            Self::Ai { .. } => "ai",
            Self::Composite { .. } => "composite",
        }
    }

    /// The shared options block.
    pub fn common(&self) -> &StrategyCommon {
        match self {
            Self::Test { common, .. }
            | Self::E2e { common, .. }
            | Self::Script { common, .. }
            | Self::Http { common, .. }
            | Self::File { common, .. }
            | Self::Command { common, .. }
            | Self::Manual { common, .. }
            | Self::Ai { common, .. }
            | Self::Composite { common, .. } => common,
        }
    }

    /// A bare ai strategy, the final fallback in resolution.
    pub fn ai_fallback() -> Self {
        Self::Ai {
            focus: None,
            common: StrategyCommon::required(),
        }
    }
}
