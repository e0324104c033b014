//! Append-only plaintext failure log.
//!
//! One line per failed batch: `[<ISO-8601 timestamp>] <message>`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

/// Failure log file. Appends are serialized within the process.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a timestamped line, creating the file if needed.
    pub fn append(&self, message: &str) -> std::io::Result<()> {
        let line = format_line(Utc::now(), message);
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Render one log line. Embedded newlines are flattened so each entry
/// stays on a single line.
pub(crate) fn format_line(at: DateTime<Utc>, message: &str) -> String {
    let flat = message.replace(['\r', '\n'], " ");
    format!("[{}] {}\n", at.to_rfc3339_opts(SecondsFormat::Millis, true), flat)
}
