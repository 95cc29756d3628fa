//! Partial-trust corridor.
//!
//! A deterministic rule pipeline stays in charge of every decision; this
//! crate lets an LLM candidate replace the baseline for one narrow,
//! allowlisted intent — and only after deterministic sampling, structural
//! validation, referential-integrity checks and a confidence gate all pass.
//! On any failure the corridor is invisible: the baseline decision is
//! returned unchanged and a redacted risk record is emitted.
//!
//! Built on the `llm-policy` crate's escalation runtime.

pub mod acceptance;
pub mod candidate;
pub mod command;
pub mod config;
pub mod orchestrator;
pub mod risk_log;
pub mod sampling;

pub use acceptance::{
    evaluate_candidate, AcceptanceVerdict, ConfidenceBucket, ReasonCode, RiskSummary,
};
pub use candidate::{
    CandidateGenerator, DecisionCandidate, GenerationFailure, ItemExtraction, ModelMeta,
    PARTIAL_TRUST_TASK_ID, PROPOSE_ADD_SHOPPING_ITEM,
};
pub use command::{
    Command, CommandContext, Decision, DecisionAction, DecisionPayload, Household, Member,
    ProposedAction, ShoppingList,
};
pub use config::{CorridorConfig, ALLOWED_CORRIDOR_INTENTS, DEFAULT_CORRIDOR_INTENT};
pub use orchestrator::CorridorOrchestrator;
pub use risk_log::{
    BaselineSummary, CorridorRecord, CorridorSink, CorridorStatus, JsonlCorridorSink,
    MemoryCorridorSink, TracingCorridorSink,
};
pub use sampling::stable_sample;
