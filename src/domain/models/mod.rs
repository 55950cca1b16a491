//! Domain models.

pub mod capabilities;
pub mod config;
pub mod impact;
pub mod index;
pub mod progress;
pub mod strategy;
pub mod task;
pub mod verification;

pub use capabilities::{
    Capabilities, Capability, CapabilityCache, CapabilitySource, E2eCapability,
};
pub use config::{AgentConfig, ForemanConfig, LoggingConfig, RetryConfig, VerifyConfig};
pub use impact::{ImpactConfidence, TaskImpact};
pub use index::{IndexEntry, TaskIndex, TaskStats};
pub use progress::{ProgressEntry, ProgressKind};
pub use strategy::{
    CompositeOperator, ExitExpectation, StrategyCommon, VerificationStrategy,
};
pub use task::{
    E2eTestRequirement, Task, TaskOrigin, TaskStatus, TaskType, TddGuidance, TestRequirements,
    UnitTestRequirement, VerificationSummary,
};
pub use verification::{
    fold_outcomes, CriterionResult, StrategyOutcome, VerificationResult, Verdict,
};
