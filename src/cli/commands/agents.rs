//! `foreman agents`: list known agent profiles and availability.

use anyhow::Result;
use comfy_table::{presets, Table};

use crate::cli::app::App;
use crate::cli::output;
use crate::services::agent_invoker::PromptDelivery;

pub async fn handle_agents(app: &App, json: bool) -> Result<()> {
    let detected = app.invoker.detect_all().await;

    if json {
        let rows: Vec<serde_json::Value> = detected
            .iter()
            .map(|(profile, available)| {
                serde_json::json!({
                    "name": profile.name,
                    "command": profile.command,
                    "delivery": delivery_name(profile.delivery),
                    "available": available,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "agents": rows }));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["agent", "command", "prompt via", "available"]);
    for (profile, available) in &detected {
        table.add_row(vec![
            profile.name.clone(),
            profile.command.join(" "),
            delivery_name(profile.delivery).to_string(),
            if *available { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");

    if detected.iter().any(|(_, available)| *available) {
        output::success("at least one agent is ready");
    } else {
        output::warning("no agent found on PATH; AI verification will degrade");
    }
    Ok(())
}

fn delivery_name(delivery: PromptDelivery) -> &'static str {
    match delivery {
        PromptDelivery::Stdin => "stdin",
        PromptDelivery::File => "file",
        PromptDelivery::Argument => "argument",
    }
}
