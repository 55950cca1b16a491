//! `foreman fail <id> -r <reason>`: explicitly mark a task failed.

use anyhow::Result;
use chrono::Utc;

use crate::cli::app::App;
use crate::cli::output;
use crate::domain::models::{ProgressEntry, ProgressKind, TaskStatus};

pub async fn handle_fail(app: &App, id: &str, reason: &str, json: bool) -> Result<()> {
    let note = format!("Failed {}: {reason}", Utc::now().format("%Y-%m-%d"));
    let task = app
        .store
        .update_status_quick_with_note(id, TaskStatus::Failed, Some(note))
        .await?;

    app.progress.append(
        &ProgressEntry::new(ProgressKind::Change, "marked failed")
            .with_feature(id.to_string())
            .with_details(reason.to_string()),
    )?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": task.id, "status": task.status, "reason": reason })
        );
    } else {
        output::failure(&format!("{id} marked failed: {reason}"));
    }
    Ok(())
}
