//! Diagnostic tracing for the hook commands.
//!
//! Hooks must never fail their host, so diagnostics are the only error
//! channel: stderr always, plus an optional append-only file configured in
//! `[logging]`. The file is opened once per invocation, never truncated, and
//! every event is written through as it happens.
//!
//! # Example
//! ```bash
//! RUST_LOG=task_enricher=debug task-enricher enrich < event.json
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::io::config::LoggingConfig;

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; falls back to `config.level`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")
}
