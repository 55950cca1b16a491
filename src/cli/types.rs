//! CLI type definitions.
//!
//! This module contains the clap command structures that define the CLI
//! interface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Agent Foreman - long-task harness for AI coding agents", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Verbose diagnostics
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the ai/ state layout (migrates a legacy task list)
    Init {
        /// Re-initialize even if state already exists
        #[arg(short, long)]
        force: bool,

        /// Skip the AI project scan that seeds initial tasks
        #[arg(long)]
        no_scan: bool,
    },

    /// Show the next task to work on (or a specific task by id)
    Next {
        /// Task id, e.g. auth.login
        id: Option<String>,
    },

    /// Show task statistics and recent activity
    Status,

    /// Verify a task, or run the fast layered check over changed files
    Check {
        /// Task id; omitted runs the layered check on the working tree
        id: Option<String>,

        /// Run the full automated check suite
        #[arg(long)]
        full: bool,

        /// Use autonomous AI verification
        #[arg(long)]
        ai: bool,

        /// Skip end-to-end tests
        #[arg(long)]
        skip_e2e: bool,

        /// Restrict test runs to a pattern
        #[arg(long)]
        test_pattern: Option<String>,
    },

    /// Mark a task passing
    Done {
        /// Task id
        id: String,
    },

    /// Mark a task failed with a reason
    Fail {
        /// Task id
        id: String,

        /// Why the task failed
        #[arg(short, long)]
        reason: String,
    },

    /// Show which tasks the current changes affect
    Impact {
        /// Limit the report to one task id
        id: Option<String>,
    },

    /// Show or set the TDD mode
    Tdd {
        /// strict, recommended, or disabled; omitted prints the current mode
        mode: Option<String>,
    },

    /// List known agents and their availability
    Agents,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::parse_from([
            "foreman",
            "check",
            "auth.login",
            "--ai",
            "--skip-e2e",
            "--test-pattern",
            "auth/**",
        ]);
        match cli.command {
            Commands::Check {
                id,
                ai,
                skip_e2e,
                test_pattern,
                full,
            } => {
                assert_eq!(id.as_deref(), Some("auth.login"));
                assert!(ai);
                assert!(skip_e2e);
                assert!(!full);
                assert_eq!(test_pattern.as_deref(), Some("auth/**"));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn parses_fail_with_reason() {
        let cli = Cli::parse_from(["foreman", "fail", "auth.login", "-r", "flaky backend"]);
        match cli.command {
            Commands::Fail { id, reason } => {
                assert_eq!(id, "auth.login");
                assert_eq!(reason, "flaky backend");
            }
            _ => panic!("expected fail"),
        }
    }

    #[test]
    fn fail_requires_a_reason() {
        assert!(Cli::try_parse_from(["foreman", "fail", "auth.login"]).is_err());
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::parse_from(["foreman", "status", "--json"]);
        assert!(cli.json);
    }
}
