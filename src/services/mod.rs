//! Services: selection, detection, impact analysis, agent invocation, and
//! verification.

pub mod agent_invoker;
pub mod ai_discovery;
pub mod capability_detector;
pub mod impact_analyzer;
pub mod prompts;
pub mod selector;
pub mod tdd;
pub mod verification;
pub mod wire;

pub use agent_invoker::{AgentCallResult, AgentInvoker, AgentProfile, CallOptions};
pub use capability_detector::{CapabilityDetector, DetectOptions};
pub use prompts::{PromptLibrary, PromptName};
pub use selector::{select_next, BlockedBy, Selection};
pub use tdd::TddMode;
