use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::ProfileRecord;

/// Append-only destination for completed profiles
pub trait ProfilerSink: Send + Sync {
    /// Store one record
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O or serialization error; the profiler logs it.
    fn persist(&self, record: &ProfileRecord) -> io::Result<()>;
}

/// Appends one JSON line per request to a file
pub struct FileSink {
    path: PathBuf,
    // Whole-line appends from concurrent requests must not interleave
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfilerSink for FileSink {
    fn persist(&self, record: &ProfileRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)
    }
}

/// Keeps records in memory; handy for tests and debug endpoints
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<serde_json::Value>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far, as JSON
    #[must_use]
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.records.lock().clone()
    }
}

impl ProfilerSink for MemorySink {
    fn persist(&self, record: &ProfileRecord) -> io::Result<()> {
        let value = serde_json::to_value(record).map_err(io::Error::other)?;
        self.records.lock().push(value);
        Ok(())
    }
}
