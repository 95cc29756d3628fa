//! Escalation-aware LLM call runtime.
//!
//! This crate owns the path from "a logical task needs a model" to "a
//! validated, typed result or a classified failure":
//!
//! - a read-only call catalog routing (task, profile) to provider parameters
//! - the [`caller::LlmCaller`] boundary the host application implements
//! - the escalation controller: repair retries within a profile, a single
//!   escalation to the top tier on content failures, immediate termination
//!   on infrastructure failures
//! - per-attempt audit records that never contain prompt or response text
//!
//! The partial-trust corridor built on top of this runtime lives in the
//! `corridor` crate.

pub mod audit;
pub mod caller;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod http;
pub mod runtime;

pub use audit::{AttemptRecord, AttemptSink, JsonlAttemptSink, MemoryAttemptSink, TracingAttemptSink};
pub use caller::{CallError, LlmCaller};
pub use catalog::{CallSpec, CatalogError, PolicyCatalog, ProfileId, DEFAULT_PROFILE, TOP_TIER_PROFILE};
pub use config::bootstrap_http_caller;
pub use errors::TaskErrorKind;
pub use http::HttpLlmCaller;
pub use runtime::{
    schema_text, EscalationRunner, RunnerOptions, TaskRunReport, ATTEMPTS_PER_PROFILE,
};
