//! Attempt-level audit records.
//!
//! Every call attempt emits exactly one [`AttemptRecord`] to the configured
//! sink. Records carry identifiers, flags, latency and counters — never the
//! prompt or the raw completion text.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One audited call attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub task_id: String,
    pub provider: String,
    pub model: String,
    pub profile: String,
    pub ok: bool,
    /// Wall-clock latency of the attempt; `None` when the call never
    /// returned (timeout, transport failure before a response).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Attempt count so far in this run, accumulated across profiles.
    pub attempts: u32,
    pub escalated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Destination for attempt records. Process-wide, shared across runs.
pub trait AttemptSink: Send + Sync {
    fn record(&self, record: &AttemptRecord);
}

/// Default sink: one structured tracing event per attempt.
#[derive(Debug, Default)]
pub struct TracingAttemptSink;

impl AttemptSink for TracingAttemptSink {
    fn record(&self, record: &AttemptRecord) {
        info!(
            target: "llm_policy",
            trace_id = record.trace_id.as_deref().unwrap_or("-"),
            task_id = %record.task_id,
            provider = %record.provider,
            model = %record.model,
            profile = %record.profile,
            ok = record.ok,
            latency_ms = record.latency_ms,
            attempts = record.attempts,
            escalated = record.escalated,
            error_kind = record.error_kind.as_deref().unwrap_or("-"),
            "llm task attempt"
        );
    }
}

/// In-memory sink for tests and offline analysis.
#[derive(Debug, Default)]
pub struct MemoryAttemptSink {
    records: Mutex<Vec<AttemptRecord>>,
}

impl MemoryAttemptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().expect("attempt sink poisoned").clone()
    }
}

impl AttemptSink for MemoryAttemptSink {
    fn record(&self, record: &AttemptRecord) {
        self.records
            .lock()
            .expect("attempt sink poisoned")
            .push(record.clone());
    }
}

/// Append-only line-delimited JSON sink.
#[derive(Debug)]
pub struct JsonlAttemptSink {
    path: PathBuf,
}

impl JsonlAttemptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttemptSink for JsonlAttemptSink {
    fn record(&self, record: &AttemptRecord) {
        if let Err(e) = append_jsonl(&self.path, record) {
            warn!(path = %self.path.display(), "failed to append attempt record: {e}");
        }
    }
}

pub(crate) fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let line = serde_json::to_string(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}
