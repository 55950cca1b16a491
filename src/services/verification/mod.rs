//! Verification: strategy registry, executors, pipeline, automated
//! checks, autonomous AI verification, and the layered fast check.

pub mod autonomous;
pub mod checks;
pub mod executors;
pub mod layered;
pub mod pipeline;
pub mod registry;
pub mod response;

pub use autonomous::{autonomous_verify, AutonomousOptions};
pub use checks::{
    discover_selective_tests, run_automated_checks, CheckPlan, ChecksReport, E2eMode, TestMode,
};
pub use layered::{layered_check, LayeredReport};
pub use pipeline::{resolve_strategies, StrategySource, VerificationPipeline};
pub use registry::{ExecutionContext, StrategyExecution, StrategyExecutor, StrategyRegistry};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::models::{AgentConfig, Capabilities};
    use crate::infrastructure::process::ProcessRegistry;
    use crate::services::agent_invoker::AgentInvoker;
    use crate::services::prompts::PromptLibrary;

    use super::registry::{ExecutionContext, StrategyRegistry};

    /// An execution context over a temp project root, with no detected
    /// capabilities and the default registry.
    pub fn context_for(root: &Path) -> ExecutionContext {
        let processes = ProcessRegistry::new();
        // No agent profiles: tests never probe or spawn a real agent.
        let invoker = AgentInvoker::with_profiles(
            Arc::clone(&processes),
            AgentConfig::default(),
            Vec::new(),
        );
        ExecutionContext {
            project_root: root.to_path_buf(),
            capabilities: Capabilities::none(),
            registry: StrategyRegistry::with_defaults(),
            processes,
            invoker: Arc::new(invoker),
            prompts: PromptLibrary::new(root.join("ai/prompts")),
            e2e_timeout: Duration::from_secs(120),
        }
    }

    /// Same context but with explicit capabilities.
    pub fn context_with_caps(root: &Path, capabilities: Capabilities) -> ExecutionContext {
        let mut ctx = context_for(root);
        ctx.capabilities = capabilities;
        ctx
    }
}
