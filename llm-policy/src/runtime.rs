//! Escalation-aware task runtime.
//!
//! Routes a logical task through the call catalog, validates the completion
//! against the task's typed schema, and retries/escalates on content
//! failures only:
//!
//! ```text
//! run_task(task, prompt, profile)
//!   → profile sequence: starting profile, then "reliable" once if different
//!   → within a profile, up to ATTEMPTS_PER_PROFILE attempts:
//!       attempt 1: original prompt
//!       attempt 2: repair prompt (schema + the raw invalid output)
//!   → invalid_json / schema_validation_failed on the final attempt of a
//!     non-top profile escalates; timeout / llm_unavailable / llm_error
//!     terminate the whole run immediately
//! ```
//!
//! Attempts within one run are strictly sequential — attempt N+1 depends on
//! attempt N's raw output. Each attempt is independently timed and audited.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::audit::{AttemptRecord, AttemptSink, TracingAttemptSink};
use crate::caller::{CallError, LlmCaller};
use crate::catalog::{CallSpec, PolicyCatalog, ProfileId};
use crate::errors::TaskErrorKind;

/// Attempts made within one profile before abandoning it: the original
/// prompt plus one repair retry. A policy decision, paired with the
/// two-profile sequence fixed by [`crate::catalog::TOP_TIER_PROFILE`].
pub const ATTEMPTS_PER_PROFILE: u32 = 2;

/// Runtime switches. The profile here is used when a run does not name one.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub enabled: bool,
    pub default_profile: ProfileId,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            default_profile: ProfileId::cheap(),
        }
    }
}

/// Outcome of one escalation run.
///
/// `outcome` is `Ok` with validated data or `Err` with the terminal failure
/// kind — a successful run always carries data and a failed run never does.
/// `attempts` accumulates across profiles; `escalated` is true once any
/// profile beyond the starting one was tried.
#[derive(Debug)]
pub struct TaskRunReport<T> {
    pub outcome: Result<T, TaskErrorKind>,
    pub attempts: u32,
    pub profile: ProfileId,
    pub escalated: bool,
}

impl<T> TaskRunReport<T> {
    fn failed(kind: TaskErrorKind, attempts: u32, profile: ProfileId, escalated: bool) -> Self {
        Self {
            outcome: Err(kind),
            attempts,
            profile,
            escalated,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_kind(&self) -> Option<TaskErrorKind> {
        self.outcome.as_ref().err().copied()
    }
}

/// The escalation controller. Holds its collaborators explicitly — catalog,
/// caller and sink are constructor dependencies, never process globals.
pub struct EscalationRunner {
    catalog: Arc<PolicyCatalog>,
    caller: Arc<dyn LlmCaller>,
    sink: Arc<dyn AttemptSink>,
    options: RunnerOptions,
}

impl EscalationRunner {
    pub fn new(
        catalog: Arc<PolicyCatalog>,
        caller: Arc<dyn LlmCaller>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            catalog,
            caller,
            sink: Arc::new(TracingAttemptSink),
            options,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn default_profile(&self) -> &ProfileId {
        &self.options.default_profile
    }

    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    /// Run one task to a validated `T` or a classified failure.
    ///
    /// The prompt is built by the caller; this runtime only builds repair
    /// prompts. `trace_id` is threaded into every attempt record.
    pub async fn run_task<T>(
        &self,
        task_id: &str,
        prompt: &str,
        profile: Option<ProfileId>,
        trace_id: Option<&str>,
    ) -> TaskRunReport<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let start_profile = profile.unwrap_or_else(|| self.options.default_profile.clone());

        if !self.options.enabled {
            return TaskRunReport::failed(TaskErrorKind::PolicyDisabled, 0, start_profile, false);
        }
        if !self.catalog.route_exists(task_id, &start_profile) {
            return TaskRunReport::failed(TaskErrorKind::PolicyMissing, 0, start_profile, false);
        }

        let mut sequence = vec![start_profile.clone()];
        if !start_profile.is_top_tier() {
            sequence.push(ProfileId::reliable());
        }

        let mut attempts = 0u32;
        let mut escalated = false;

        for current in &sequence {
            if *current != start_profile {
                escalated = true;
            }
            match self
                .run_profile::<T>(task_id, current, prompt, trace_id, &mut attempts, escalated)
                .await
            {
                Ok(data) => {
                    return TaskRunReport {
                        outcome: Ok(data),
                        attempts,
                        profile: current.clone(),
                        escalated,
                    };
                }
                Err(kind) => {
                    if kind.escalates() && !current.is_top_tier() {
                        continue;
                    }
                    return TaskRunReport::failed(kind, attempts, current.clone(), escalated);
                }
            }
        }

        TaskRunReport::failed(TaskErrorKind::LlmError, attempts, start_profile, escalated)
    }

    async fn run_profile<T>(
        &self,
        task_id: &str,
        profile: &ProfileId,
        prompt: &str,
        trace_id: Option<&str>,
        attempts: &mut u32,
        escalated: bool,
    ) -> Result<T, TaskErrorKind>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let mut last_raw = String::new();
        for attempt_index in 0..ATTEMPTS_PER_PROFILE {
            *attempts += 1;
            let Some(spec) = self.catalog.resolve(task_id, profile) else {
                return Err(TaskErrorKind::PolicyMissing);
            };
            let call_prompt: Cow<'_, str> = if attempt_index == 0 {
                Cow::Borrowed(prompt)
            } else {
                Cow::Owned(build_repair_prompt::<T>(&last_raw))
            };

            let started = Instant::now();
            let raw = match self.call_with_deadline(spec, &call_prompt).await {
                Ok(raw) => raw,
                Err(err) => {
                    let kind = err.task_kind();
                    self.log_attempt(
                        trace_id, task_id, profile, spec, false, None, *attempts, escalated,
                        Some(kind),
                    );
                    return Err(kind);
                }
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            last_raw = raw;

            let failure = match parse_validated::<T>(&last_raw) {
                Ok(data) => {
                    self.log_attempt(
                        trace_id,
                        task_id,
                        profile,
                        spec,
                        true,
                        Some(latency_ms),
                        *attempts,
                        escalated,
                        None,
                    );
                    return Ok(data);
                }
                Err(kind) => kind,
            };

            self.log_attempt(
                trace_id,
                task_id,
                profile,
                spec,
                false,
                Some(latency_ms),
                *attempts,
                escalated,
                Some(failure),
            );
            if attempt_index + 1 < ATTEMPTS_PER_PROFILE {
                continue;
            }
            return Err(failure);
        }

        Err(TaskErrorKind::LlmError)
    }

    /// One attempt with the spec's deadline applied. Deadline expiry drops
    /// the call future, which abandons the request at the caller boundary.
    async fn call_with_deadline(&self, spec: &CallSpec, prompt: &str) -> Result<String, CallError> {
        match spec.timeout_ms {
            Some(ms) if ms > 0 => {
                match tokio::time::timeout(
                    Duration::from_millis(ms),
                    self.caller.call(spec, prompt),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(CallError::Timeout),
                }
            }
            _ => self.caller.call(spec, prompt).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_attempt(
        &self,
        trace_id: Option<&str>,
        task_id: &str,
        profile: &ProfileId,
        spec: &CallSpec,
        ok: bool,
        latency_ms: Option<f64>,
        attempts: u32,
        escalated: bool,
        error_kind: Option<TaskErrorKind>,
    ) {
        self.sink.record(&AttemptRecord {
            timestamp: Utc::now(),
            trace_id: trace_id.map(str::to_string),
            task_id: task_id.to_string(),
            provider: spec.provider.clone(),
            model: spec.model.clone(),
            profile: profile.as_str().to_string(),
            ok,
            latency_ms: latency_ms.map(|ms| (ms * 100.0).round() / 100.0),
            attempts,
            escalated,
            error_kind: error_kind.map(|k| k.as_str().to_string()),
        });
    }
}

/// Parse the raw completion into a validated `T`.
///
/// Not-JSON or not-an-object is `invalid_json`; a JSON object that does not
/// deserialize into `T` (unknown fields included) is
/// `schema_validation_failed`.
fn parse_validated<T: DeserializeOwned>(raw: &str) -> Result<T, TaskErrorKind> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Err(TaskErrorKind::InvalidJson),
    };
    if !value.is_object() {
        return Err(TaskErrorKind::InvalidJson);
    }
    serde_json::from_value(value).map_err(|_| TaskErrorKind::SchemaValidationFailed)
}

/// Repair prompt: the task schema plus the model's own invalid output,
/// asking it to self-correct. Never logged.
fn build_repair_prompt<T: JsonSchema>(raw: &str) -> String {
    let schema = schema_text::<T>();
    format!(
        "Исправь JSON так, чтобы он соответствовал схеме. \
         Верни только JSON без пояснений.\nСхема: {schema}\nОтвет: {raw}"
    )
}

/// JSON Schema of `T` as compact JSON text, for embedding into prompts.
pub fn schema_text<T: JsonSchema>() -> String {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_string(&schema).unwrap_or_default()
}
