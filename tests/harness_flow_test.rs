//! End-to-end orchestration flows over a temp project tree.

use std::sync::Arc;
use std::time::Duration;

use agent_foreman::domain::models::{
    Capabilities, Capability, IndexEntry, RetryConfig, StrategyCommon, Task, TaskIndex, TaskStatus,
    Verdict, VerificationStrategy,
};
use agent_foreman::infrastructure::process::ProcessRegistry;
use agent_foreman::infrastructure::store::{
    ProgressLog, StateLayout, TaskStore, VerificationStore,
};
use agent_foreman::services::agent_invoker::AgentInvoker;
use agent_foreman::services::selector::select_next;
use agent_foreman::services::verification::{
    ExecutionContext, StrategyRegistry, VerificationPipeline,
};
use agent_foreman::services::PromptLibrary;

fn context(root: &std::path::Path, capabilities: Capabilities) -> ExecutionContext {
    let processes = ProcessRegistry::new();
    let invoker = AgentInvoker::with_profiles(
        Arc::clone(&processes),
        agent_foreman::domain::models::AgentConfig::default(),
        Vec::new(),
    );
    ExecutionContext {
        project_root: root.to_path_buf(),
        capabilities,
        registry: StrategyRegistry::with_defaults(),
        processes,
        invoker: Arc::new(invoker),
        prompts: PromptLibrary::new(root.join("ai/prompts")),
        e2e_timeout: Duration::from_secs(120),
    }
}

fn seed(store: &TaskStore, tasks: Vec<Task>) {
    let mut index = TaskIndex::empty();
    for task in tasks {
        let saved = store.save_task(&task).unwrap();
        index.features.insert(
            saved.id.clone(),
            IndexEntry {
                status: saved.status,
                priority: saved.priority,
                module: saved.module.clone(),
                description: saved.description.clone(),
                file_path: saved.file_path.clone(),
            },
        );
    }
    store.save_index(&mut index).unwrap();
}

/// Fresh project: seed one failing task, select it, verify it with a test
/// strategy whose command exits 0, mark it done, and watch the index
/// follow along.
#[tokio::test]
async fn fresh_init_select_verify_pass_done() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::new(StateLayout::new(dir.path(), "ai"), RetryConfig::default());

    let mut task = Task::new("core.hello", "Print a greeting")
        .with_priority(1)
        .with_acceptance("prints hello");
    task.verification_strategies = Some(vec![VerificationStrategy::Test {
        pattern: None,
        cases: vec![],
        common: StrategyCommon::required(),
    }]);
    seed(&store, vec![task]);

    // Selection finds the seeded task.
    let index = store.load_index().unwrap();
    let selection = select_next(&store, &index).unwrap();
    let selected = selection.task.unwrap();
    assert_eq!(selected.id, "core.hello");
    assert_eq!(selected.status, TaskStatus::Failing);
    assert!(selection.blocked_by.is_none());

    // `true` stands in for the project's test command.
    let mut caps = Capabilities::none();
    caps.test = Capability::detected("true", 0.9);
    let ctx = context(dir.path(), caps);

    let artifacts = VerificationStore::new(store.layout().verification_dir());
    let progress = ProgressLog::new(store.layout().progress_log_path());
    let pipeline = VerificationPipeline {
        store: &store,
        artifacts: &artifacts,
        progress: &progress,
        ctx: &ctx,
    };

    let result = pipeline.verify_task(&selected).await.unwrap();
    assert_eq!(result.verdict, Verdict::Pass);

    // Explicit transition to passing; the index reflects it.
    store
        .update_status_quick("core.hello", TaskStatus::Passing)
        .await
        .unwrap();
    let index = store.load_index().unwrap();
    assert_eq!(
        index.features.get("core.hello").unwrap().status,
        TaskStatus::Passing
    );

    let stats = store.stats_from_index().unwrap();
    assert_eq!(stats.passing, 1);
    assert_eq!(stats.total, 1);

    // Selection is now empty.
    let selection = select_next(&store, &index).unwrap();
    assert!(selection.task.is_none());
}

/// BREAKDOWN tasks shadow implementation candidates and annotate the
/// selection with blockedBy.
#[tokio::test]
async fn breakdown_first_with_blocked_by_annotation() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::new(StateLayout::new(dir.path(), "ai"), RetryConfig::default());

    seed(
        &store,
        vec![
            Task::new("auth.login", "Login flow").with_priority(1),
            Task::new("auth.BREAKDOWN", "Decompose auth").with_priority(10),
        ],
    );

    let index = store.load_index().unwrap();
    let selection = select_next(&store, &index).unwrap();
    assert_eq!(selection.task.unwrap().id, "auth.BREAKDOWN");
    assert_eq!(selection.blocked_by.unwrap().count(), 1);
}

/// Two callers race the same status transition from the same starting
/// version; both succeed, one per retry attempt, with no lost update.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn optimistic_conflict_resolved_by_retry() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::new(StateLayout::new(dir.path(), "ai"), RetryConfig::default());
    seed(&store, vec![Task::new("x.y", "Race target")]);

    let before = store.load_task("x.y").unwrap().unwrap().version;

    let store_a = store.clone();
    let store_b = store.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            store_a
                .update_status_quick("x.y", TaskStatus::Passing)
                .await
        }),
        tokio::spawn(async move {
            store_b
                .update_status_quick("x.y", TaskStatus::Passing)
                .await
        }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    assert_ne!(a.version, b.version, "each commit claimed its own version");
    let final_task = store.load_task("x.y").unwrap().unwrap();
    assert_eq!(final_task.status, TaskStatus::Passing);
    assert!(final_task.version > before);
    assert_eq!(final_task.version, a.version.max(b.version));
}

/// Stats computed from the index equal stats computed by loading every
/// task file, modulo deprecated exclusion.
#[tokio::test]
async fn index_stats_match_full_load_stats() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::new(StateLayout::new(dir.path(), "ai"), RetryConfig::default());

    seed(
        &store,
        vec![
            Task::new("a.one", "One").with_status(TaskStatus::Failing),
            Task::new("a.two", "Two").with_status(TaskStatus::Passing),
            Task::new("b.three", "Three").with_status(TaskStatus::NeedsReview),
            Task::new("b.four", "Four").with_status(TaskStatus::Deprecated),
        ],
    );

    let index_stats = store.stats_from_index().unwrap();

    let mut full_total = 0usize;
    let mut full_passing = 0usize;
    for id in store.list_ids().unwrap() {
        let task = store.load_task(&id).unwrap().unwrap();
        if task.status == TaskStatus::Deprecated {
            continue;
        }
        full_total += 1;
        if task.status == TaskStatus::Passing {
            full_passing += 1;
        }
    }

    assert_eq!(index_stats.total, full_total);
    assert_eq!(index_stats.passing, full_passing);
    assert_eq!(index_stats.total, 3, "deprecated excluded");
}

/// Composite AND with a failing first leg short-circuits; the second leg
/// never executes. (The second leg here is an ai strategy with no agent
/// available, which would report failure if it ran.)
#[tokio::test]
async fn composite_and_short_circuit() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::new(StateLayout::new(dir.path(), "ai"), RetryConfig::default());

    let mut task = Task::new("core.combo", "Composite check");
    task.verification_strategies = Some(vec![VerificationStrategy::Composite {
        operator: agent_foreman::domain::models::CompositeOperator::And,
        strategies: vec![
            VerificationStrategy::Test {
                pattern: None,
                cases: vec![],
                common: StrategyCommon::required(),
            },
            VerificationStrategy::Ai {
                focus: None,
                common: StrategyCommon::required(),
            },
        ],
        common: StrategyCommon::required(),
    }]);
    seed(&store, vec![task]);
    let task = store.load_task("core.combo").unwrap().unwrap();

    // `false` as the test command guarantees the first leg fails.
    let mut caps = Capabilities::none();
    caps.test = Capability::detected("false", 0.9);
    let ctx = context(dir.path(), caps);

    let artifacts = VerificationStore::new(store.layout().verification_dir());
    let progress = ProgressLog::new(store.layout().progress_log_path());
    let pipeline = VerificationPipeline {
        store: &store,
        artifacts: &artifacts,
        progress: &progress,
        ctx: &ctx,
    };

    let result = pipeline.verify_task(&task).await.unwrap();
    assert_eq!(result.verdict, Verdict::Fail);

    let outcome = &result.strategies[0];
    assert_eq!(outcome.kind, "composite");
    let details = outcome.details.as_ref().unwrap();
    assert_eq!(details["shortCircuited"], serde_json::json!(true));
    assert_eq!(
        details["nested"].as_array().unwrap().len(),
        1,
        "the ai leg never ran"
    );
}
