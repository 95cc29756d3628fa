//! LLM candidate generation for the corridor.
//!
//! Builds the extraction prompt, runs it through the escalation runtime
//! under the corridor's overall budget, and maps the typed extraction into a
//! normalized [`DecisionCandidate`]. A candidate is a proposal, not a
//! decision — it earns nothing until the acceptance gates pass it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use llm_policy::runtime::schema_text;
use llm_policy::{EscalationRunner, ProfileId, TaskErrorKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::command::{Command, ProposedAction};
use crate::config::DEFAULT_CORRIDOR_INTENT;

/// Catalog task id for corridor extraction.
pub const PARTIAL_TRUST_TASK_ID: &str = "partial_trust_shopping";

/// Action kind a corridor candidate may propose.
pub const PROPOSE_ADD_SHOPPING_ITEM: &str = "propose_add_shopping_item";

/// Concurrent corridor generations allowed process-wide.
pub const DEFAULT_GENERATION_SLOTS: usize = 1;

/// Typed extraction schema the model must satisfy.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ItemExtraction {
    #[schemars(length(min = 1))]
    pub item_name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Provenance of a candidate: which route produced it and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub profile: String,
    pub task_id: String,
    pub escalated: bool,
}

/// A normalized, not-yet-trusted decision proposal. Immutable; lives for
/// one decision cycle.
#[derive(Debug, Clone)]
pub struct DecisionCandidate {
    pub intent: String,
    pub job_type: Option<String>,
    pub proposed_actions: Vec<ProposedAction>,
    pub confidence: Option<f64>,
    pub model_meta: Option<ModelMeta>,
    pub latency_ms: u64,
}

/// Why no candidate was produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("command text is empty")]
    EmptyText,
    #[error("policy layer is disabled")]
    PolicyDisabled,
    #[error("generation budget elapsed")]
    Budget,
    #[error("task failed: {0}")]
    Task(TaskErrorKind),
    #[error("extraction did not yield a usable item")]
    InvalidExtraction,
}

impl GenerationFailure {
    /// Label for audit records.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::EmptyText => "empty_text",
            Self::PolicyDisabled => "policy_disabled",
            Self::Budget => "timeout",
            Self::Task(kind) => kind.as_str(),
            Self::InvalidExtraction => "invalid_schema",
        }
    }
}

pub struct CandidateGenerator {
    runner: Arc<EscalationRunner>,
    slots: Arc<Semaphore>,
    budget_ms: u64,
    profile: Option<ProfileId>,
}

impl CandidateGenerator {
    pub fn new(runner: Arc<EscalationRunner>, budget_ms: u64, profile: Option<ProfileId>) -> Self {
        Self {
            runner,
            slots: Arc::new(Semaphore::new(DEFAULT_GENERATION_SLOTS)),
            budget_ms,
            profile,
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(slots.max(1)));
        self
    }

    pub fn policy_enabled(&self) -> bool {
        self.runner.is_enabled()
    }

    /// Whether a catalog route exists for the corridor task at the profile
    /// the generator would use.
    pub fn route_available(&self) -> bool {
        if !self.runner.is_enabled() {
            return false;
        }
        let profile = self
            .profile
            .clone()
            .unwrap_or_else(|| self.runner.default_profile().clone());
        self.runner
            .catalog()
            .route_exists(PARTIAL_TRUST_TASK_ID, &profile)
    }

    /// Generate one candidate for the command, or a classified failure.
    ///
    /// The whole escalation run shares the corridor budget; when it elapses
    /// the run future is dropped, abandoning any in-flight call.
    pub async fn generate(
        &self,
        command: &Command,
    ) -> Result<DecisionCandidate, GenerationFailure> {
        let text = command.text.trim();
        if text.is_empty() {
            return Err(GenerationFailure::EmptyText);
        }
        if !self.runner.is_enabled() {
            return Err(GenerationFailure::PolicyDisabled);
        }

        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| GenerationFailure::Budget)?;

        let prompt = build_extraction_prompt(text);
        let trace_id = command.trace_id.as_deref();
        let started = Instant::now();

        let run = self.runner.run_task::<ItemExtraction>(
            PARTIAL_TRUST_TASK_ID,
            &prompt,
            self.profile.clone(),
            trace_id,
        );
        let report = if self.budget_ms > 0 {
            match tokio::time::timeout(Duration::from_millis(self.budget_ms), run).await {
                Ok(report) => report,
                Err(_) => return Err(GenerationFailure::Budget),
            }
        } else {
            run.await
        };

        let profile = report.profile.as_str().to_string();
        let escalated = report.escalated;
        let extraction = match report.outcome {
            Ok(extraction) => extraction,
            Err(kind) => return Err(GenerationFailure::Task(kind)),
        };

        let item_name = extraction.item_name.trim();
        if item_name.is_empty() {
            return Err(GenerationFailure::InvalidExtraction);
        }

        let mut item = serde_json::Map::new();
        item.insert("name".to_string(), json!(item_name));
        for (key, value) in [
            ("quantity", &extraction.quantity),
            ("unit", &extraction.unit),
            ("list_id", &extraction.list_id),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                item.insert(key.to_string(), json!(value));
            }
        }

        Ok(DecisionCandidate {
            intent: DEFAULT_CORRIDOR_INTENT.to_string(),
            job_type: Some(DEFAULT_CORRIDOR_INTENT.to_string()),
            proposed_actions: vec![ProposedAction {
                action: PROPOSE_ADD_SHOPPING_ITEM.to_string(),
                payload: json!({ "item": item }),
            }],
            confidence: extraction.confidence.map(|c| c.clamp(0.0, 1.0)),
            model_meta: Some(ModelMeta {
                profile,
                task_id: PARTIAL_TRUST_TASK_ID.to_string(),
                escalated,
            }),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn build_extraction_prompt(text: &str) -> String {
    let schema = schema_text::<ItemExtraction>();
    format!(
        "Извлеки параметры покупки из текста пользователя. \
         Верни только JSON по схеме.\nСхема: {schema}\nТекст: {text}"
    )
}
