use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "PLUTO_LOGLEVEL";

/// Filter directive for a `-v` count when neither `RUST_LOG` nor
/// `PLUTO_LOGLEVEL` is set.
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("{}={level}", env!("CARGO_CRATE_NAME"))
}

/// ANSI escapes only go to stderr, and never under `no_color`.
fn ansi_enabled(log_file: Option<&Path>, no_color: bool) -> bool {
    log_file.is_none() && !no_color
}

/// Installs the global subscriber. Logs go to stderr, or are appended to
/// `log_file` without ANSI colors. Fails if called twice.
pub fn initialize_logging(
    verbosity: u8,
    log_file: Option<&Path>,
    no_color: bool,
) -> Result<(), String> {
    let directive = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_directive(verbosity));

    let writer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    format!("failed to create log directory '{}': {e}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("failed to open log file '{}': {e}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(ansi_enabled(log_file, no_color))
        .with_filter(EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))
}
