//! `foreman status`: task stats from the index plus recent activity.

use anyhow::Result;

use crate::cli::app::App;
use crate::cli::output;

const ACTIVITY_TAIL: usize = 10;

pub async fn handle_status(app: &App, json: bool) -> Result<()> {
    let stats = app.store.stats_from_index()?;
    let recent = app.progress.tail(ACTIVITY_TAIL)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "stats": stats, "recent": recent })
        );
        return Ok(());
    }

    output::header("Tasks");
    println!("{}", output::stats_table(&stats));

    if !recent.is_empty() {
        output::header("\nRecent activity");
        for entry in recent {
            let feature = entry
                .feature_id
                .map(|f| format!(" ({f})"))
                .unwrap_or_default();
            println!(
                "  {} [{}]{} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.kind.as_str(),
                feature,
                entry.summary
            );
        }
    }
    Ok(())
}
