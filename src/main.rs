//! Agent Foreman CLI entry point.

use agent_foreman::cli::commands::{
    agents, check, done, fail, impact, init, next, status, tdd,
};
use agent_foreman::cli::{App, Cli, Commands};
use agent_foreman::infrastructure::config::ConfigLoader;
use agent_foreman::infrastructure::logging;
use anyhow::{Context, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _log_guard = logging::init(&config.logging)?;

    let project_root = std::env::current_dir().context("Failed to resolve working directory")?;
    let app = App::new(project_root, config);

    // Ctrl-C cancels every tracked subprocess, newest first, before the
    // process exits.
    let processes = std::sync::Arc::clone(&app.processes);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling subprocesses");
            processes.cancel_all();
            std::process::exit(130);
        }
    });

    match cli.command {
        Commands::Init { force, no_scan } => {
            init::handle_init(&app, force, no_scan, cli.json).await?;
        }
        Commands::Next { id } => {
            next::handle_next(&app, id, cli.json).await?;
        }
        Commands::Status => {
            status::handle_status(&app, cli.json).await?;
        }
        Commands::Check {
            id,
            full,
            ai,
            skip_e2e,
            test_pattern,
        } => {
            check::handle_check(
                &app,
                check::CheckArgs {
                    id,
                    full,
                    ai,
                    skip_e2e,
                    test_pattern,
                    verbose: cli.verbose,
                    json: cli.json,
                },
            )
            .await?;
        }
        Commands::Done { id } => {
            done::handle_done(&app, &id, cli.json).await?;
        }
        Commands::Fail { id, reason } => {
            fail::handle_fail(&app, &id, &reason, cli.json).await?;
        }
        Commands::Impact { id } => {
            impact::handle_impact(&app, id, cli.json).await?;
        }
        Commands::Tdd { mode } => {
            tdd::handle_tdd(&app, mode, cli.json)?;
        }
        Commands::Agents => {
            agents::handle_agents(&app, cli.json).await?;
        }
    }

    Ok(())
}
