use std::{fs::File, sync::Arc};

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// debug-level copy of the run, truncated each invocation
pub const LOG_FILE: &str = "provision.log";

/// Lenient parse of the optional AMQP client log level argument.
/// "warning" and "critical" are accepted for operators used to the
/// original tool's level names.
pub fn client_level(arg: &str) -> Option<Level> {
    match arg.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

/// Console gets INFO and above, the log file gets DEBUG and above, and the
/// AMQP client library is clamped to `amqp_level` across both.
pub fn init(amqp_level: Level) -> anyhow::Result<()> {
    let file = File::create(LOG_FILE)
        .with_context(|| format!("failed to create log file {LOG_FILE}"))?;

    let filter = EnvFilter::new(format!("debug,lapin={amqp_level}"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(LevelFilter::DEBUG),
        )
        .try_init()
        .context("failed to install the log subscriber")?;
    Ok(())
}
