//! `foreman init`: create the state layout, migrate legacy task lists,
//! and optionally seed tasks from an AI project scan.

use anyhow::Result;
use serde::Deserialize;

use crate::cli::app::App;
use crate::cli::output;
use crate::domain::models::{IndexEntry, ProgressEntry, ProgressKind, Task, TaskIndex, TaskOrigin};
use crate::services::agent_invoker::CallOptions;
use crate::services::ai_discovery::directory_listing;
use crate::services::prompts::PromptName;
use crate::services::wire::extract_json;

#[derive(Debug, Deserialize)]
struct SeedTask {
    id: String,
    #[serde(default)]
    module: Option<String>,
    description: String,
    #[serde(default = "default_priority")]
    priority: u32,
    #[serde(default)]
    acceptance: Vec<String>,
}

fn default_priority() -> u32 {
    1
}

pub async fn handle_init(app: &App, force: bool, no_scan: bool, json: bool) -> Result<()> {
    let index_exists = app.layout.index_path().exists();
    if index_exists && !force {
        output::warning("already initialized; use --force to re-run the scan");
        return Ok(());
    }

    std::fs::create_dir_all(app.layout.tasks_dir())?;
    std::fs::create_dir_all(app.layout.verification_dir())?;

    // Legacy single-file lists migrate before anything else.
    if let Some(report) = crate::infrastructure::store::migrate_if_needed(&app.store)? {
        output::success(&format!(
            "migrated {} legacy tasks ({} errors)",
            report.migrated,
            report.errors.len()
        ));
        for (id, message) in &report.errors {
            output::warning(&format!("  {id}: {message}"));
        }
    }

    let mut index = match app.store.try_load_index()? {
        Some(index) => index,
        None => {
            let mut index = TaskIndex::empty();
            app.store.save_index(&mut index)?;
            index
        }
    };

    let mut seeded = 0usize;
    if !no_scan && index.features.is_empty() {
        seeded = seed_from_scan(app, &mut index).await?;
    }

    app.progress.append(
        &ProgressEntry::new(ProgressKind::Init, "project initialized")
            .with_details(format!("{} tasks", index.features.len())),
    )?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "initialized": true, "tasks": index.features.len(), "seeded": seeded })
        );
    } else {
        output::success(&format!(
            "initialized {} ({} tasks)",
            app.layout.state_root().display(),
            index.features.len()
        ));
    }
    Ok(())
}

/// Ask an agent to propose seed tasks. Degrades silently when no agent is
/// available or the answer is unusable.
async fn seed_from_scan(app: &App, index: &mut TaskIndex) -> Result<usize> {
    if !app.invoker.has_agent().await {
        output::dim("no agent available, skipping project scan");
        return Ok(0);
    }

    let spinner = output::spinner("scanning project for seed tasks");
    let listing = directory_listing(app.layout.project_root());
    let prompt = app
        .prompts
        .render(PromptName::ProjectScan, &[("directory_listing", &listing)]);
    let result = app
        .invoker
        .call_any_available_agent(&prompt, CallOptions::in_dir(app.layout.project_root()))
        .await;
    spinner.finish_and_clear();

    if !result.success {
        output::warning("project scan failed, starting with an empty task list");
        return Ok(0);
    }
    let Some(json) = extract_json(&result.output) else {
        output::warning("project scan returned no tasks");
        return Ok(0);
    };
    let Ok(seeds) = serde_json::from_str::<Vec<SeedTask>>(&json) else {
        output::warning("project scan answer failed validation");
        return Ok(0);
    };

    let mut seeded = 0usize;
    for seed in seeds.into_iter().take(20) {
        let mut task = Task::new(seed.id, seed.description).with_priority(seed.priority);
        if let Some(module) = seed.module {
            task.module = module;
        }
        task.acceptance = seed.acceptance;
        task.origin = TaskOrigin::SpecWorkflow;

        if task.validate().is_err() || index.features.contains_key(&task.id) {
            continue;
        }
        match app.store.save_task(&task) {
            Ok(saved) => {
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
                seeded += 1;
            }
            Err(err) => output::warning(&format!("could not save seed task: {err}")),
        }
    }

    if seeded > 0 {
        app.store.save_index(index)?;
        output::success(&format!("seeded {seeded} tasks from the project scan"));
    }
    Ok(seeded)
}
