//! Corridor orchestrator.
//!
//! Composes sampler → candidate generation → acceptance and degrades to the
//! deterministic baseline on every failure. The corridor must never crash or
//! stall the pipeline it augments: candidate generation runs as a spawned
//! task so even a panic is caught at this boundary, and every enabled-path
//! decision emits exactly one risk record.
//!
//! ```text
//! decide(command, baseline)
//!   ├─ corridor disabled            → baseline (no record, corridor invisible)
//!   ├─ baseline outside corridor    → corridor_mismatch
//!   ├─ capability absent            → capability_mismatch
//!   ├─ not sampled                  → not_sampled
//!   ├─ no LLM route                 → route_unavailable
//!   ├─ generation panicked          → error(panic)
//!   ├─ rejected / no candidate      → fallback_deterministic(reason)
//!   └─ all gates passed             → accepted_llm
//! ```

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::acceptance::{evaluate_candidate, AcceptanceVerdict, RiskSummary};
use crate::candidate::{CandidateGenerator, DecisionCandidate, PROPOSE_ADD_SHOPPING_ITEM};
use crate::command::{Command, Decision};
use crate::config::CorridorConfig;
use crate::risk_log::{
    BaselineSummary, CorridorRecord, CorridorSink, CorridorStatus, TracingCorridorSink,
};
use crate::sampling::stable_sample;

pub struct CorridorOrchestrator {
    config: CorridorConfig,
    generator: Arc<CandidateGenerator>,
    sink: Arc<dyn CorridorSink>,
}

impl CorridorOrchestrator {
    pub fn new(config: CorridorConfig, generator: Arc<CandidateGenerator>) -> Self {
        Self {
            config,
            generator,
            sink: Arc::new(TracingCorridorSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn CorridorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Decide the command: the corridor-accepted decision when every gate
    /// passes, otherwise the unchanged baseline.
    pub async fn decide(&self, command: &Command, baseline: Decision) -> Decision {
        let Some(intent) = self.config.corridor_intent().map(str::to_string) else {
            return baseline;
        };

        if !baseline.starts_job(&intent) {
            self.record(command, &baseline, CorridorStatus::CorridorMismatch, None, None, None);
            return baseline;
        }
        if !command.capabilities.contains(PROPOSE_ADD_SHOPPING_ITEM) {
            self.record(
                command,
                &baseline,
                CorridorStatus::CapabilityMismatch,
                None,
                None,
                None,
            );
            return baseline;
        }
        if !stable_sample(command.command_id.as_deref(), self.config.sample_rate) {
            self.record(command, &baseline, CorridorStatus::NotSampled, None, None, None);
            return baseline;
        }
        if !self.generator.route_available() {
            self.record(
                command,
                &baseline,
                CorridorStatus::RouteUnavailable,
                None,
                None,
                None,
            );
            return baseline;
        }

        // Generation runs as its own unit of work; a panic inside it must
        // degrade to baseline, not unwind into the pipeline.
        let generator = Arc::clone(&self.generator);
        let generation_command = command.clone();
        let handle =
            tokio::spawn(async move { generator.generate(&generation_command).await });
        let generated = match handle.await {
            Ok(generated) => generated,
            Err(join_error) => {
                let reason = if join_error.is_panic() { "panic" } else { "cancelled" };
                self.record(
                    command,
                    &baseline,
                    CorridorStatus::Error,
                    Some(reason.to_string()),
                    None,
                    None,
                );
                return baseline;
            }
        };

        let (candidate, generation_error) = match generated {
            Ok(candidate) => (Some(candidate), None),
            Err(failure) => (None, Some(failure.reason_label().to_string())),
        };

        let verdict = evaluate_candidate(
            candidate.as_ref(),
            Some(&intent),
            self.generator.policy_enabled(),
            Some(&command.context.known_list_ids()),
        );

        match candidate {
            Some(candidate) if verdict.accepted => {
                let decision = build_accepted_decision(&baseline, &intent, &candidate);
                self.record(
                    command,
                    &baseline,
                    CorridorStatus::AcceptedLlm,
                    Some(verdict.reason.as_str().to_string()),
                    generation_error,
                    Some(verdict),
                );
                decision
            }
            _ => {
                self.record(
                    command,
                    &baseline,
                    CorridorStatus::FallbackDeterministic,
                    Some(verdict.reason.as_str().to_string()),
                    generation_error,
                    Some(verdict),
                );
                baseline
            }
        }
    }

    fn record(
        &self,
        command: &Command,
        baseline: &Decision,
        status: CorridorStatus,
        reason_code: Option<String>,
        generation_error: Option<String>,
        verdict: Option<AcceptanceVerdict>,
    ) {
        self.sink.record(&CorridorRecord {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trace_id: command.trace_id.clone(),
            command_id: command.command_id.clone(),
            status,
            reason_code,
            generation_error,
            candidate_summary: verdict
                .map(|v| v.summary)
                .unwrap_or_else(RiskSummary::missing),
            baseline_summary: BaselineSummary::of(baseline),
        });
    }
}

/// The accepted decision keeps the baseline's framing but carries the
/// candidate's validated action.
fn build_accepted_decision(
    baseline: &Decision,
    intent: &str,
    candidate: &DecisionCandidate,
) -> Decision {
    let mut decision = baseline.clone();
    decision.payload.job_type = Some(intent.to_string());
    decision.payload.proposed_actions = candidate.proposed_actions.clone();
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_decision_replaces_proposed_actions_only() {
        let baseline = Decision::start_job(
            "add_shopping_item",
            vec![crate::command::ProposedAction {
                action: PROPOSE_ADD_SHOPPING_ITEM.to_string(),
                payload: serde_json::json!({ "item": {"name": "из правил"} }),
            }],
            "Распознан запрос на добавление покупки.",
        );
        let candidate = DecisionCandidate {
            intent: "add_shopping_item".to_string(),
            job_type: Some("add_shopping_item".to_string()),
            proposed_actions: vec![crate::command::ProposedAction {
                action: PROPOSE_ADD_SHOPPING_ITEM.to_string(),
                payload: serde_json::json!({ "item": {"name": "бананы"} }),
            }],
            confidence: Some(0.9),
            model_meta: None,
            latency_ms: 10,
        };
        let decision = build_accepted_decision(&baseline, "add_shopping_item", &candidate);
        assert_eq!(
            decision.payload.proposed_actions[0].payload["item"]["name"],
            "бананы"
        );
        assert_eq!(
            decision.payload.explanation.as_deref(),
            Some("Распознан запрос на добавление покупки.")
        );
    }
}
