//! Persistence for remote payloads that failed validation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

/// One persisted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugRecord {
    /// Timestamp key (UTC, microsecond resolution).
    pub key: String,
    pub reason: String,
    pub payload: String,
}

impl DebugRecord {
    fn now(reason: &str, payload: &str) -> Self {
        Self {
            key: Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string(),
            reason: reason.to_string(),
            payload: payload.to_string(),
        }
    }
}

/// Receives raw payloads the remote extractor could not fully use.
///
/// Persisting is best effort and must never fail the caller.
pub trait DebugSink: Send + Sync {
    fn persist(&self, reason: &str, payload: &str);
}

/// Writes `<dir>/<timestamp>_<reason>.json`.
#[derive(Debug, Clone)]
pub struct FileDebugSink {
    dir: PathBuf,
}

impl FileDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, record: &DebugRecord) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}_{}.json", record.key, record.reason));
        std::fs::write(&path, &record.payload)?;
        Ok(path)
    }
}

impl DebugSink for FileDebugSink {
    fn persist(&self, reason: &str, payload: &str) {
        let record = DebugRecord::now(reason, payload);
        match self.write(&record) {
            Ok(path) => info!("Saved remote payload to {}", path.display()),
            Err(e) => warn!(error = %e, dir = %self.dir.display(), "Failed to save remote payload"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDebugSink;

impl DebugSink for NullDebugSink {
    fn persist(&self, _reason: &str, _payload: &str) {}
}

/// Keeps payloads in memory.
#[derive(Debug, Default)]
pub struct MemoryDebugSink {
    records: Mutex<Vec<DebugRecord>>,
}

impl MemoryDebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DebugRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl DebugSink for MemoryDebugSink {
    fn persist(&self, reason: &str, payload: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(DebugRecord::now(reason, payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_sink_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDebugSink::new(dir.path().join("remote_debug"));
        sink.persist("malformed_response", "{\"hp\": ");

        let entries: Vec<_> = std::fs::read_dir(sink.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.ends_with("_malformed_response.json"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"hp\": ");
    }

    #[test]
    fn test_file_sink_never_panics() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file where the directory should be.
        FileDebugSink::new(file.path()).persist("schema_violation", "{}");
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryDebugSink::new();
        sink.persist("schema_violation", "{\"hp\": 4000}");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "schema_violation");
        assert!(records[0].key.ends_with('Z'));
    }
}
