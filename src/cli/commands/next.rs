//! `foreman next [id]`: select and print the next task to attempt.

use anyhow::{anyhow, Result};

use crate::cli::app::App;
use crate::cli::output;
use crate::domain::models::{ProgressEntry, ProgressKind, Task};
use crate::services::selector::select_next;
use crate::services::tdd;

pub async fn handle_next(app: &App, id: Option<String>, json: bool) -> Result<()> {
    let index = app.store.load_index()?;

    let (task, blocked_by) = match id {
        Some(id) => {
            let task = app
                .store
                .load_task(&id)?
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            (Some(task), None)
        }
        None => {
            let selection = select_next(&app.store, &index)?;
            (selection.task, selection.blocked_by)
        }
    };

    let Some(task) = task else {
        if json {
            println!("{}", serde_json::json!({ "task": null }));
        } else {
            output::success("no selectable tasks; everything is passing, blocked, or done");
        }
        return Ok(());
    };

    app.progress.append(
        &ProgressEntry::new(ProgressKind::Step, "selected task").with_feature(task.id.clone()),
    )?;

    let guidance = tdd_guidance_if_wanted(app, &task).await;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "task": task,
                "blockedBy": blocked_by.as_ref().map(|b| serde_json::json!({
                    "ids": b.ids,
                    "count": b.count(),
                })),
                "tddGuidance": guidance,
            })
        );
        return Ok(());
    }

    print_task(&task);
    if let Some(blocked) = blocked_by {
        output::warning(&format!(
            "{} BREAKDOWN task(s) must be decomposed before implementation tasks: {}",
            blocked.count(),
            blocked.ids.join(", ")
        ));
    }
    if let Some(guidance) = guidance {
        output::header("\nTDD guidance");
        println!("{guidance}");
    }
    output::dim(&format!(
        "\nwhen the work is done, run: foreman check {}",
        task.id
    ));
    Ok(())
}

async fn tdd_guidance_if_wanted(app: &App, task: &Task) -> Option<String> {
    let mode = tdd::load_mode(&app.layout);
    if !mode.wants_guidance() {
        return None;
    }
    match tdd::guidance_for(&app.store, &app.invoker, &app.prompts, task).await {
        Ok(guidance) => guidance,
        Err(err) => {
            tracing::debug!(error = %err, "TDD guidance unavailable");
            None
        }
    }
}

fn print_task(task: &Task) {
    output::header(&format!("{}  [{}]", task.id, task.status));
    println!("priority {}  module {}\n", task.priority, task.module);
    println!("{}", task.description);

    if !task.acceptance.is_empty() {
        output::header("\nAcceptance Criteria");
        for (i, criterion) in task.acceptance.iter().enumerate() {
            println!("  {}. {criterion}", i + 1);
        }
    }
    if !task.depends_on.is_empty() {
        output::dim(&format!("\ndepends on: {}", task.depends_on.join(", ")));
    }
    if let Some(ref notes) = task.notes {
        output::header("\nNotes");
        println!("{notes}");
    }
}
