//! Logger module
//!
//! Two separate streams:
//! - diagnostics through `tracing`, to stderr or `logging.error_log_file`
//! - access log lines in a configurable format, to stdout or
//!   `logging.access_log_file`

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::fallback::PROFILE_TABLE_VERSION;
use std::net::SocketAddr;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Initialize both log streams
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    writer::init(config.logging.access_log_file.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.logging.error_log_file.as_deref() {
        Some(path) => {
            let file = writer::open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()?;
        }
        None => builder.with_writer(std::io::stderr).try_init()?,
    }
    Ok(())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Fallback gateway started");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!(
        "Proxy endpoint: http://{addr}{}?url=...",
        config.proxy.path
    );
    tracing::info!(
        "Profile table v{PROFILE_TABLE_VERSION}, attempt timeout {} ms, mode {:?}",
        config.proxy.timeout_ms,
        config.proxy.mode
    );
    if config.static_files.enabled {
        tracing::info!("Serving files from: {}", config.static_files.root);
    }
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("Access log: {path}");
    }
    tracing::info!("======================================");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    writer::write_access(&entry.format(format));
}
