//! Tracing initialization.
//!
//! Diagnostics go to stderr so command output on stdout stays parseable.
//! `FOREMAN_LOG` overrides the configured level with a full env-filter
//! directive; `FOREMAN_DEBUG=1` raises the default level to debug.

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Env var carrying a full filter directive, e.g. `agent_foreman=trace`.
pub const LOG_ENV: &str = "FOREMAN_LOG";
/// Debug flag gating verbose diagnostics.
pub const DEBUG_ENV: &str = "FOREMAN_DEBUG";

/// Holds the file-appender guard; dropping it flushes buffered output.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber from config.
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let default_level = if debug_enabled() {
        Level::DEBUG
    } else {
        parse_log_level(&config.level)?
    };

    let env_filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let guard = if let Some(ref log_dir) = config.log_dir {
        let file_appender = rolling::daily(log_dir, "foreman.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        // File layer stays JSON for structured logging.
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true);

        let stderr_layer = stderr_layer(&config.format).with_filter(env_filter);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .init();

        Some(guard)
    } else {
        let stderr_layer = stderr_layer(&config.format).with_filter(env_filter);
        tracing_subscriber::registry().with(stderr_layer).init();
        None
    };

    tracing::debug!(
        level = %config.level,
        format = %config.format,
        file_output = config.log_dir.is_some(),
        "logger initialized"
    );

    Ok(LogGuard { _guard: guard })
}

/// Whether the debug flag is set.
pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn stderr_layer<S>(format: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .boxed()
    }
}

/// Parse log level string to Level.
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("WARN"), Ok(Level::WARN)));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_debug_flag() {
        temp_env::with_var(DEBUG_ENV, Some("1"), || {
            assert!(debug_enabled());
        });
        temp_env::with_var(DEBUG_ENV, Some("true"), || {
            assert!(debug_enabled());
        });
        temp_env::with_var(DEBUG_ENV, None::<&str>, || {
            assert!(!debug_enabled());
        });
    }
}
