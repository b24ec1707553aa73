//! Logging initialization

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Initialize logging
///
/// `RUST_LOG` wins when set. Otherwise `--debug` forces `debug` and `level`
/// (from configuration) applies. Logs go to stderr so stdout stays clean for
/// YAML output, or to `log_file` when one is given.
pub fn init_logging(debug: bool, level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug, level)));

    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            (BoxMakeWriter::new(file), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_ansi(ansi) // No ANSI codes in log files
        .with_target(true)
        .with_file(debug)
        .with_line_number(debug)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn default_directive(debug: bool, level: &str) -> String {
    if debug {
        return "debug".to_string();
    }
    let level = level.trim();
    if level.is_empty() {
        "info".to_string()
    } else {
        level.to_string()
    }
}
