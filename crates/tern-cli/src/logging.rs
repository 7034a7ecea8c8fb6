//! Tracing setup for the tern binary
//!
//! Diagnostics go to stderr so that stdout only carries command results.
//! `RUST_LOG` wins over the `-v` count when it is set.

use anyhow::{anyhow, Result};
use std::io;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Level selected by the number of `-v` flags
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn directive(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("tern={level},tern_cli={level},tern_config={level},tern_package={level}")
}

/// Install the global subscriber
pub fn init(verbosity: u8) -> Result<()> {
    let level = level_for(verbosity);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(level)))
        .map_err(|e| anyhow!("Failed to create tracing filter: {e}"))?;

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(verbosity >= 2);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
