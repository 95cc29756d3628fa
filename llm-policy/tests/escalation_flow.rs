//! Integration tests for the escalation runtime: full catalog → caller →
//! validation → audit flow with a scripted caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use llm_policy::{
    CallError, CallSpec, EscalationRunner, LlmCaller, MemoryAttemptSink, PolicyCatalog, ProfileId,
    RunnerOptions, TaskErrorKind, DEFAULT_PROFILE, TOP_TIER_PROFILE,
};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct Extraction {
    item_name: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Replays a scripted sequence of caller results, recording each prompt.
struct ScriptedCaller {
    script: Mutex<VecDeque<Result<String, CallError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCaller {
    fn new(script: Vec<Result<String, CallError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmCaller for ScriptedCaller {
    async fn call(&self, _spec: &CallSpec, prompt: &str) -> Result<String, CallError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CallError::Other("script exhausted".into())))
    }
}

fn catalog() -> Arc<PolicyCatalog> {
    let mut catalog = PolicyCatalog::new();
    catalog.insert_route(
        "shopping_extraction",
        DEFAULT_PROFILE,
        CallSpec::new("openai_compatible", "small-model"),
    );
    catalog.insert_route(
        "shopping_extraction",
        TOP_TIER_PROFILE,
        CallSpec::new("openai_compatible", "big-model"),
    );
    Arc::new(catalog)
}

fn runner_with(
    caller: Arc<ScriptedCaller>,
    sink: Arc<MemoryAttemptSink>,
) -> EscalationRunner {
    EscalationRunner::new(
        catalog(),
        caller,
        RunnerOptions {
            enabled: true,
            default_profile: ProfileId::cheap(),
        },
    )
    .with_sink(sink)
}

#[tokio::test]
async fn invalid_json_twice_on_cheap_then_valid_on_reliable() {
    let caller = Arc::new(ScriptedCaller::new(vec![
        Ok("мусор".to_string()),
        Ok("ещё мусор".to_string()),
        Ok(r#"{"item_name": "бананы", "confidence": 0.9}"#.to_string()),
    ]));
    let sink = Arc::new(MemoryAttemptSink::new());
    let runner = runner_with(caller.clone(), sink.clone());

    let report = runner
        .run_task::<Extraction>("shopping_extraction", "Купи бананы", None, Some("trace-1"))
        .await;

    let data = report.outcome.expect("validated data");
    assert_eq!(data.item_name, "бананы");
    assert_eq!(report.attempts, 3);
    assert!(report.escalated);
    assert_eq!(report.profile.as_str(), TOP_TIER_PROFILE);

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].attempts, 1);
    assert!(!records[0].escalated);
    assert_eq!(records[0].error_kind.as_deref(), Some("invalid_json"));
    assert_eq!(records[1].attempts, 2);
    assert_eq!(records[2].attempts, 3);
    assert!(records[2].escalated);
    assert!(records[2].ok);
    assert_eq!(records[2].model, "big-model");
}

#[tokio::test]
async fn timeout_on_first_attempt_is_terminal() {
    let caller = Arc::new(ScriptedCaller::new(vec![Err(CallError::Timeout)]));
    let sink = Arc::new(MemoryAttemptSink::new());
    let runner = runner_with(caller, sink.clone());

    let report = runner
        .run_task::<Extraction>("shopping_extraction", "Купи молоко", None, None)
        .await;

    assert_eq!(report.error_kind(), Some(TaskErrorKind::Timeout));
    assert_eq!(report.attempts, 1);
    assert!(!report.escalated);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].ok);
    assert_eq!(records[0].latency_ms, None);
    assert_eq!(records[0].error_kind.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn repair_prompt_carries_schema_and_raw_output_but_is_never_audited() {
    let caller = Arc::new(ScriptedCaller::new(vec![
        Ok("почти JSON".to_string()),
        Ok(r#"{"item_name": "молоко"}"#.to_string()),
    ]));
    let sink = Arc::new(MemoryAttemptSink::new());
    let runner = runner_with(caller.clone(), sink.clone());

    let report = runner
        .run_task::<Extraction>("shopping_extraction", "Купи молоко", None, None)
        .await;
    assert!(report.is_ok());
    assert_eq!(report.attempts, 2);
    assert!(!report.escalated);

    let prompts = caller.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], "Купи молоко");
    assert!(prompts[1].contains("почти JSON"));
    assert!(prompts[1].contains("item_name"));

    // Audit records carry identifiers and counters only.
    let serialized = serde_json::to_string(&sink.records()).unwrap();
    assert!(!serialized.contains("Купи"));
    assert!(!serialized.contains("молоко"));
    assert!(!serialized.contains("почти"));
}

#[tokio::test]
async fn disabled_runtime_reports_policy_disabled_without_calling() {
    let caller = Arc::new(ScriptedCaller::new(vec![]));
    let runner = EscalationRunner::new(catalog(), caller.clone(), RunnerOptions::default());

    let report = runner
        .run_task::<Extraction>("shopping_extraction", "Купи хлеб", None, None)
        .await;

    assert_eq!(report.error_kind(), Some(TaskErrorKind::PolicyDisabled));
    assert_eq!(report.attempts, 0);
    assert!(caller.prompts().is_empty());
}
