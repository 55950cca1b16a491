//! `foreman done <id>`: explicitly transition a task to passing.

use anyhow::Result;

use crate::cli::app::App;
use crate::cli::output;
use crate::domain::models::{ProgressEntry, ProgressKind, TaskStatus};

pub async fn handle_done(app: &App, id: &str, json: bool) -> Result<()> {
    let task = app.store.update_status_quick(id, TaskStatus::Passing).await?;

    app.progress.append(
        &ProgressEntry::new(ProgressKind::Change, "marked passing").with_feature(id.to_string()),
    )?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": task.id, "status": task.status, "version": task.version })
        );
    } else {
        output::success(&format!("{id} is passing"));
    }
    Ok(())
}
