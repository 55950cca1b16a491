//! Terminal output helpers: styled lines, spinners, and tables.

use std::time::Duration;

use comfy_table::{presets, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::models::TaskStats;

pub fn success(message: &str) {
    println!("{} {message}", style("✓").green().bold());
}

pub fn failure(message: &str) {
    println!("{} {message}", style("✗").red().bold());
}

pub fn warning(message: &str) {
    println!("{} {message}", style("!").yellow().bold());
}

pub fn header(message: &str) {
    println!("{}", style(message).bold());
}

pub fn dim(message: &str) {
    println!("{}", style(message).dim());
}

/// Spinner for an in-flight operation.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("spinner template"),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// The status table shown by `foreman status`.
pub fn stats_table(stats: &TaskStats) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "total",
        "passing",
        "failing",
        "needs_review",
        "blocked",
        "failed",
        "done",
    ]);
    table.add_row(vec![
        stats.total.to_string(),
        stats.passing.to_string(),
        stats.failing.to_string(),
        stats.needs_review.to_string(),
        stats.blocked.to_string(),
        stats.failed.to_string(),
        format!("{:.0}%", stats.percent_passing()),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_table_renders_all_columns() {
        let stats = TaskStats {
            total: 4,
            failing: 1,
            passing: 2,
            blocked: 0,
            needs_review: 1,
            failed: 0,
        };
        let rendered = stats_table(&stats).to_string();
        assert!(rendered.contains("passing"));
        assert!(rendered.contains("50%"));
    }
}
