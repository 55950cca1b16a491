//! Strategy executor registry.
//!
//! One executor per strategy kind, process-wide. Registration is
//! last-wins; dispatching an unknown kind is a typed error. Composites
//! re-enter the registry through the context so nesting works to any
//! depth.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{Capabilities, StrategyCommon, Task, VerificationStrategy};
use crate::domain::{ForemanError, ForemanResult};
use crate::infrastructure::process::{CommandSpec, ProcessRegistry};
use crate::services::agent_invoker::AgentInvoker;
use crate::services::prompts::PromptLibrary;

/// Raw outcome of executing one strategy, before verdict folding.
#[derive(Debug, Clone, Default)]
pub struct StrategyExecution {
    pub success: bool,
    /// The strategy asks for human review instead of pass/fail.
    pub needs_review: bool,
    /// Failure looks transient (timeout, network); eligible for declared
    /// retries.
    pub transient: bool,
    pub output: Option<String>,
    pub duration_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
}

impl StrategyExecution {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn review(output: impl Into<String>) -> Self {
        Self {
            success: false,
            needs_review: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// Everything an executor needs to run a strategy.
pub struct ExecutionContext {
    pub project_root: PathBuf,
    pub capabilities: Capabilities,
    pub registry: Arc<StrategyRegistry>,
    pub processes: Arc<ProcessRegistry>,
    pub invoker: Arc<AgentInvoker>,
    pub prompts: PromptLibrary,
    /// Default timeout for E2E subprocesses.
    pub e2e_timeout: Duration,
}

impl ExecutionContext {
    /// Apply a strategy's shared options to a command spec: env overlay
    /// plus timeout (the strategy's own, or the given default).
    pub fn apply_common(
        &self,
        mut spec: CommandSpec,
        common: &StrategyCommon,
        default_timeout: Option<Duration>,
    ) -> CommandSpec {
        for (key, value) in &common.env {
            spec = spec.env(key.clone(), value.clone());
        }
        let timeout = common
            .timeout_secs
            .map(Duration::from_secs)
            .or(default_timeout);
        if let Some(timeout) = timeout {
            spec = spec.timeout(timeout);
        }
        spec
    }
}

/// One verification mechanism implementation.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    /// The strategy kind this executor handles.
    fn kind(&self) -> &'static str;

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        task: &Task,
    ) -> ForemanResult<StrategyExecution>;
}

/// Kind → executor map.
#[derive(Default)]
pub struct StrategyRegistry {
    executors: RwLock<HashMap<String, Arc<dyn StrategyExecutor>>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor. A later registration for the same kind wins.
    pub fn register(&self, executor: Arc<dyn StrategyExecutor>) {
        let kind = executor.kind().to_string();
        self.executors
            .write()
            .expect("registry poisoned")
            .insert(kind, executor);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn StrategyExecutor>> {
        self.executors
            .read()
            .expect("registry poisoned")
            .get(kind)
            .cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .executors
            .read()
            .expect("registry poisoned")
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }

    /// Dispatch one strategy to its executor.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let executor = self
            .get(strategy.kind())
            .ok_or_else(|| ForemanError::UnknownStrategy(strategy.kind().to_string()))?;
        executor.execute(ctx, strategy, task).await
    }

    /// Build a registry with all built-in executors registered.
    pub fn with_defaults() -> Arc<Self> {
        use super::executors;

        let registry = Arc::new(Self::new());
        registry.register(Arc::new(executors::test::TestExecutor));
        registry.register(Arc::new(executors::e2e::E2eExecutor));
        registry.register(Arc::new(executors::script::ScriptExecutor));
        registry.register(Arc::new(executors::http::HttpExecutor));
        registry.register(Arc::new(executors::file::FileExecutor));
        registry.register(Arc::new(executors::command::CommandExecutor));
        registry.register(Arc::new(executors::manual::ManualExecutor));
        registry.register(Arc::new(executors::ai::AiExecutor));
        registry.register(Arc::new(executors::composite::CompositeExecutor));
        registry
    }
}
