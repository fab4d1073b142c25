//! Logging and tracing configuration
//!
//! One-shot commands log compactly to stderr. The interactive console also
//! keeps a detailed log file, since its stdout belongs to the operator.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, writer::MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::paths;

/// Initialize tracing for one-shot commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vflowctl=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for the interactive console (file + stderr logging)
///
/// The console logs to `~/.local/share/vflowctl/logs/console.log` with every
/// line sent and received, and to stderr for warnings the operator should see.
pub fn init_console() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vflowctl=debug,info"));

    if let Some(log_file) = console_log_path() {
        let opened = log_file
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
            });

        match opened {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true);

                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr.with_max_level(tracing::Level::WARN))
                    .with_target(false)
                    .compact();

                tracing_subscriber::registry()
                    .with(filter)
                    .with(file_layer)
                    .with(stderr_layer)
                    .init();

                return Some(log_file);
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file: {}", e);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();

    None
}

/// Get the path to the console log file
pub fn console_log_path() -> Option<PathBuf> {
    paths::log_dir().map(|d| d.join("console.log"))
}

/// Truncate the console log file
pub fn truncate_console_log() -> std::io::Result<()> {
    if let Some(path) = console_log_path() {
        if path.exists() {
            std::fs::write(&path, "")?;
        }
    }
    Ok(())
}
