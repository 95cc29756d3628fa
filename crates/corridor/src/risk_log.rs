//! Corridor risk audit records.
//!
//! One record per corridor-enabled decision. NO RAW USER OR LLM TEXT —
//! identifiers, statuses, counts and buckets only.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::acceptance::RiskSummary;
use crate::command::{Decision, DecisionAction};

/// Which branch the orchestrator took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorridorStatus {
    /// Baseline decision is outside the corridor's intent.
    CorridorMismatch,
    /// The command does not carry the corridor's required capability.
    CapabilityMismatch,
    /// The transaction was not sampled into the corridor.
    NotSampled,
    /// No LLM route exists for the corridor task and profile.
    RouteUnavailable,
    /// Candidate rejected (or never produced); baseline used.
    FallbackDeterministic,
    /// Candidate accepted; the decision is LLM-derived.
    AcceptedLlm,
    /// Unexpected failure caught at the orchestrator boundary.
    Error,
}

impl CorridorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CorridorMismatch => "corridor_mismatch",
            Self::CapabilityMismatch => "capability_mismatch",
            Self::NotSampled => "not_sampled",
            Self::RouteUnavailable => "route_unavailable",
            Self::FallbackDeterministic => "fallback_deterministic",
            Self::AcceptedLlm => "accepted_llm",
            Self::Error => "error",
        }
    }
}

/// Counts-only view of the baseline decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    pub proposed_actions_count: usize,
    pub missing_fields_count: usize,
}

impl BaselineSummary {
    pub fn of(decision: &Decision) -> Self {
        Self {
            action: decision.action,
            job_type: decision.payload.job_type.clone(),
            proposed_actions_count: decision.payload.proposed_actions.len(),
            missing_fields_count: decision.payload.missing_fields.len(),
        }
    }
}

/// One corridor decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorRecord {
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    pub status: CorridorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// Failure label from candidate generation, when generation ran and
    /// produced no candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
    pub candidate_summary: RiskSummary,
    pub baseline_summary: BaselineSummary,
}

/// Destination for corridor records.
pub trait CorridorSink: Send + Sync {
    fn record(&self, record: &CorridorRecord);
}

/// Default sink: one structured tracing event per record.
#[derive(Debug, Default)]
pub struct TracingCorridorSink;

impl CorridorSink for TracingCorridorSink {
    fn record(&self, record: &CorridorRecord) {
        info!(
            target: "partial_trust",
            trace_id = record.trace_id.as_deref().unwrap_or("-"),
            command_id = record.command_id.as_deref().unwrap_or("-"),
            status = record.status.as_str(),
            reason_code = record.reason_code.as_deref().unwrap_or("-"),
            action_count = record.candidate_summary.action_count,
            item_name_len = record.candidate_summary.item_name_len,
            "partial trust decision"
        );
    }
}

/// In-memory sink for tests and offline analysis.
#[derive(Debug, Default)]
pub struct MemoryCorridorSink {
    records: Mutex<Vec<CorridorRecord>>,
}

impl MemoryCorridorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CorridorRecord> {
        self.records.lock().expect("corridor sink poisoned").clone()
    }
}

impl CorridorSink for MemoryCorridorSink {
    fn record(&self, record: &CorridorRecord) {
        self.records
            .lock()
            .expect("corridor sink poisoned")
            .push(record.clone());
    }
}

/// Append-only line-delimited JSON sink.
#[derive(Debug)]
pub struct JsonlCorridorSink {
    path: PathBuf,
}

impl JsonlCorridorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorridorSink for JsonlCorridorSink {
    fn record(&self, record: &CorridorRecord) {
        if let Err(e) = append_jsonl(&self.path, record) {
            warn!(path = %self.path.display(), "failed to append corridor record: {e}");
        }
    }
}

fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
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
