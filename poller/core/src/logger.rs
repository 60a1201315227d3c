//! Iteration Logger
//!
//! Append-only sinks for [`IterationRecord`]s. Records are written in the
//! order iterations complete, one line each, and every append is flushed
//! and synced before it returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::record::IterationRecord;

/// Failed to persist an iteration record
#[derive(Debug, Error)]
#[error("failed to write iteration record to {target}: {source}")]
pub struct SinkWriteError {
    /// Where the record was headed (file path or sink name)
    pub target: String,
    /// The underlying IO error
    #[source]
    pub source: std::io::Error,
}

/// Consumer of completed iteration records
#[async_trait]
pub trait IterationSink: Send {
    /// Durably append one record
    async fn append(&mut self, record: &IterationRecord) -> Result<(), SinkWriteError>;
}

/// Appends records to a log file, one line per record
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Open (creating if needed) the log file in append mode
    ///
    /// # Errors
    ///
    /// Returns [`SinkWriteError`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkWriteError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SinkWriteError {
                target: path.display().to_string(),
                source,
            })?;

        tracing::debug!(path = ?path, "Opened iteration log");
        Ok(Self { path, file })
    }

    /// Path of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, source: std::io::Error) -> SinkWriteError {
        SinkWriteError {
            target: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl IterationSink for FileSink {
    async fn append(&mut self, record: &IterationRecord) -> Result<(), SinkWriteError> {
        let mut line = record.to_log_line();
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        self.file.flush().await.map_err(|e| self.error(e))?;
        self.file.sync_data().await.map_err(|e| self.error(e))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    records: Vec<IterationRecord>,
    fail_next: bool,
}

/// In-memory sink; clones share the same record list
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records appended so far
    #[must_use]
    pub fn records(&self) -> Vec<IterationRecord> {
        self.inner.lock().records.clone()
    }

    /// Rendered log lines of the records appended so far
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .records
            .iter()
            .map(IterationRecord::to_log_line)
            .collect()
    }

    /// Make the next append fail with a write error
    pub fn fail_next_append(&self) {
        self.inner.lock().fail_next = true;
    }
}

#[async_trait]
impl IterationSink for MemorySink {
    async fn append(&mut self, record: &IterationRecord) -> Result<(), SinkWriteError> {
        let mut inner = self.inner.lock();
        if std::mem::take(&mut inner.fail_next) {
            return Err(SinkWriteError {
                target: "memory".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            });
        }
        inner.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throughput::Throughput;
    use chrono::{Local, TimeDelta};
    use tempfile::TempDir;

    fn record(label: &str) -> IterationRecord {
        let now = Local::now();
        IterationRecord {
            label: label.to_string(),
            sent_at: now,
            first_byte_at: now,
            completed_at: now + TimeDelta::seconds(1),
            elapsed: TimeDelta::seconds(1),
            response_bytes: 10,
            throughput: Throughput { kbps: 0.08 },
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poll.log");

        let mut sink = FileSink::open(&path).await.unwrap();
        sink.append(&record("first")).await.unwrap();
        sink.append(&record("second")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("first,"));
        assert!(lines[1].starts_with("second,"));
        assert!(lines[1].ends_with("10 bytes,0.08 kbps"));
    }

    #[tokio::test]
    async fn test_file_sink_preserves_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poll.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut sink = FileSink::open(&path).await.unwrap();
        sink.append(&record("next")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("earlier run\nnext,"));
    }

    #[tokio::test]
    async fn test_file_sink_open_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("poll.log");

        let err = FileSink::open(&path).await.unwrap_err();
        assert!(err.target.contains("missing"));
    }

    #[tokio::test]
    async fn test_memory_sink_injected_failure() {
        let mut sink = MemorySink::new();
        sink.fail_next_append();
        assert!(sink.append(&record("lost")).await.is_err());
        sink.append(&record("kept")).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "kept");
    }
}
