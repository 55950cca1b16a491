//! Shared wiring for command handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::ForemanConfig;
use crate::infrastructure::process::ProcessRegistry;
use crate::infrastructure::store::{ProgressLog, StateLayout, TaskStore, VerificationStore};
use crate::services::capability_detector::{CapabilityDetector, DetectOptions};
use crate::services::verification::{ExecutionContext, StrategyRegistry, VerificationPipeline};
use crate::services::{AgentInvoker, PromptLibrary};

/// Everything a command handler needs, built once per invocation.
pub struct App {
    pub config: ForemanConfig,
    pub layout: StateLayout,
    pub store: TaskStore,
    pub progress: ProgressLog,
    pub artifacts: VerificationStore,
    pub processes: Arc<ProcessRegistry>,
    pub invoker: Arc<AgentInvoker>,
    pub prompts: PromptLibrary,
}

impl App {
    pub fn new(project_root: PathBuf, config: ForemanConfig) -> Self {
        let layout = StateLayout::new(project_root, config.state_dir.clone());
        let store = TaskStore::new(layout.clone(), config.retry);
        let progress = ProgressLog::new(layout.progress_log_path());
        let artifacts = VerificationStore::new(layout.verification_dir());
        let processes = ProcessRegistry::new();
        let invoker = Arc::new(AgentInvoker::new(
            Arc::clone(&processes),
            config.agent.clone(),
        ));
        let prompts = PromptLibrary::new(layout.prompts_dir());

        Self {
            config,
            layout,
            store,
            progress,
            artifacts,
            processes,
            invoker,
            prompts,
        }
    }

    /// Detect capabilities and assemble an execution context for
    /// verification runs.
    pub async fn execution_context(&self, force_detect: bool, verbose: bool) -> ExecutionContext {
        let detector = CapabilityDetector::new(&self.layout, &self.invoker, &self.prompts);
        let capabilities = detector
            .detect(DetectOptions {
                force: force_detect,
                verbose,
            })
            .await;

        ExecutionContext {
            project_root: self.layout.project_root().to_path_buf(),
            capabilities,
            registry: StrategyRegistry::with_defaults(),
            processes: Arc::clone(&self.processes),
            invoker: Arc::clone(&self.invoker),
            prompts: self.prompts.clone(),
            e2e_timeout: Duration::from_secs(self.config.verify.e2e_timeout_secs),
        }
    }

    /// A pipeline borrowing this app's stores and the given context.
    pub fn pipeline<'a>(&'a self, ctx: &'a ExecutionContext) -> VerificationPipeline<'a> {
        VerificationPipeline {
            store: &self.store,
            artifacts: &self.artifacts,
            progress: &self.progress,
            ctx,
        }
    }
}
