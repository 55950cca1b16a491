//! `foreman impact [id]`: map the working tree's changes to tasks.

use anyhow::Result;

use crate::cli::app::App;
use crate::cli::output;
use crate::infrastructure::git::GitContext;
use crate::services::impact_analyzer::{is_high_risk, task_impact};

pub async fn handle_impact(app: &App, id: Option<String>, json: bool) -> Result<()> {
    let git = GitContext::new(app.layout.project_root());
    let changed_files = git.changed_files().await;

    let mut impacts = task_impact(&app.store, &changed_files)?;
    if let Some(ref id) = id {
        impacts.retain(|impact| &impact.task_id == id);
    }
    let high_risk: Vec<&String> = changed_files.iter().filter(|f| is_high_risk(f)).collect();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "changedFiles": changed_files,
                "highRiskFiles": high_risk,
                "impacts": impacts,
            })
        );
        return Ok(());
    }

    if changed_files.is_empty() {
        output::success("working tree clean, no impact");
        return Ok(());
    }

    output::header(&format!("{} changed file(s)", changed_files.len()));
    if !high_risk.is_empty() {
        output::warning(&format!(
            "high-risk: {}",
            high_risk
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    if impacts.is_empty() {
        match id {
            Some(id) => output::dim(&format!("no changed file affects {id}")),
            None => output::dim("no open task is affected"),
        }
        return Ok(());
    }

    for impact in &impacts {
        output::header(&format!(
            "{} [{}]",
            impact.task_id,
            impact.confidence.as_str()
        ));
        println!("  {}", impact.reason);
        for file in &impact.matched_files {
            output::dim(&format!("  {file}"));
        }
    }
    Ok(())
}
