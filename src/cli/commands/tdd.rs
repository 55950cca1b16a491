//! `foreman tdd [mode]`: show or set the TDD mode.

use anyhow::{anyhow, Result};

use crate::cli::app::App;
use crate::cli::output;
use crate::services::tdd::{load_mode, save_mode, TddMode};

pub fn handle_tdd(app: &App, mode: Option<String>, json: bool) -> Result<()> {
    let mode = match mode {
        Some(raw) => {
            let mode = TddMode::from_str(&raw)
                .ok_or_else(|| anyhow!("unknown TDD mode: {raw} (strict|recommended|disabled)"))?;
            save_mode(&app.layout, mode)?;
            mode
        }
        None => load_mode(&app.layout),
    };

    if json {
        println!("{}", serde_json::json!({ "mode": mode.as_str() }));
    } else {
        output::success(&format!("TDD mode: {}", mode.as_str()));
    }
    Ok(())
}
