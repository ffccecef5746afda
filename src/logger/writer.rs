//! Access log writer
//!
//! Thread-safe sink for access log lines: stdout by default, or an
//! append-only file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Global access log writer instance
static ACCESS_WRITER: OnceLock<AccessWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    Stdout,
    File(Mutex<File>),
}

/// Thread-safe access log writer
pub struct AccessWriter {
    target: LogTarget,
}

impl AccessWriter {
    fn new(access_log_file: Option<&str>) -> io::Result<Self> {
        let target = match access_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stdout,
        };
        Ok(Self { target })
    }

    fn write(&self, message: &str) {
        match &self.target {
            LogTarget::Stdout => println!("{message}"),
            LogTarget::File(file) => {
                let mut f = file.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = writeln!(f, "{message}") {
                    tracing::warn!("Failed to write access log: {e}");
                }
            }
        }
    }
}

/// Open or create a log file for appending
pub fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global access log writer
///
/// This should be called once at application startup.
/// Returns error if the log file cannot be opened.
pub fn init(access_log_file: Option<&str>) -> io::Result<()> {
    let writer = AccessWriter::new(access_log_file)?;
    ACCESS_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Access log writer already initialized",
        )
    })
}

/// Write one access log line, falling back to stdout before `init()`
pub fn write_access(message: &str) {
    match ACCESS_WRITER.get() {
        Some(writer) => writer.write(message),
        None => println!("{message}"),
    }
}
