//! Tracing configuration and log routing.
//!
//! Stdout carries the CLI's JSON output, so human-readable logs go to stderr through a compact
//! formatter. When a log file is configured (`SEMCELL_LOG_FILE`), the same events are also
//! appended to it through a non-blocking writer.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber: `RUST_LOG` filtering (default `info`), a stderr layer, and a
/// file layer when `log_file` is given and can be opened.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(log_file: Option<&Path>) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    let file_layer = log_file.and_then(file_writer).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}

fn file_writer(path: &Path) -> Option<NonBlocking> {
    let (directory, file_name) = split_log_path(path)?;
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Failed to create log directory {}: {err}", directory.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

/// Directory and file name of a log path; a bare file name logs into the working directory.
fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some((directory, file_name))
}
