//! Test-driven-development mode and cached guidance.
//!
//! The mode persists in `ai/tdd.json`. In strict or recommended mode,
//! `next` surfaces AI-generated test guidance for the selected task,
//! cached on the task and regenerated when the task has moved past the
//! version the guidance was produced for.

use serde::{Deserialize, Serialize};

use crate::domain::models::Task;
use crate::domain::ForemanResult;
use crate::infrastructure::fs::atomic_write;
use crate::infrastructure::store::{StateLayout, TaskStore};

use super::agent_invoker::{AgentInvoker, CallOptions};
use super::prompts::{PromptLibrary, PromptName};

/// How strongly the harness pushes test-first work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TddMode {
    /// Guidance is surfaced and tasks should not be marked done without
    /// tests.
    Strict,
    /// Guidance is surfaced as advice.
    Recommended,
    /// No guidance.
    Disabled,
}

impl Default for TddMode {
    fn default() -> Self {
        Self::Recommended
    }
}

impl TddMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Recommended => "recommended",
            Self::Disabled => "disabled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "recommended" => Some(Self::Recommended),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn wants_guidance(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TddState {
    mode: TddMode,
}

/// Load the persisted mode; absent or unreadable state means the default.
pub fn load_mode(layout: &StateLayout) -> TddMode {
    std::fs::read_to_string(layout.tdd_state_path())
        .ok()
        .and_then(|content| serde_json::from_str::<TddState>(&content).ok())
        .map(|state| state.mode)
        .unwrap_or_default()
}

/// Persist the mode.
pub fn save_mode(layout: &StateLayout, mode: TddMode) -> ForemanResult<()> {
    let state = TddState { mode };
    let json = serde_json::to_string_pretty(&state)?;
    atomic_write(&layout.tdd_state_path(), json.as_bytes())
}

/// Guidance for a task: the cached copy when fresh, otherwise a fresh
/// generation through the agent (cached back onto the task). Returns
/// `None` when no agent is available or the call fails; guidance is
/// advisory and never blocks selection.
pub async fn guidance_for(
    store: &TaskStore,
    invoker: &AgentInvoker,
    prompts: &PromptLibrary,
    task: &Task,
) -> ForemanResult<Option<String>> {
    if let Some(ref cached) = task.tdd_guidance {
        if !cached.is_stale_for(task.version) {
            return Ok(Some(cached.content.clone()));
        }
        tracing::debug!(task_id = %task.id, "cached TDD guidance is stale, regenerating");
    }

    let criteria = task
        .acceptance
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts.render(
        PromptName::TddGuidance,
        &[
            ("feature_id", task.id.as_str()),
            ("description", task.description.as_str()),
            ("criteria", criteria.as_str()),
        ],
    );

    let result = invoker
        .call_any_available_agent(
            &prompt,
            CallOptions::in_dir(store.layout().project_root()),
        )
        .await;
    if !result.success || result.output.trim().is_empty() {
        return Ok(None);
    }

    let content = result.output.trim().to_string();
    store
        .update_tdd_guidance_quick(&task.id, content.clone())
        .await?;
    Ok(Some(content))
}
