//! Acceptance gates for corridor candidates.
//!
//! Gates run in a fixed order and short-circuit on the first failure — the
//! order defines the reported reason code. A candidate only replaces the
//! deterministic baseline after every gate passes.
//!
//! The summary built here goes into audit logs. It must never contain a
//! string taken from user or model text: counts, booleans and enumerated
//! buckets only.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::candidate::{DecisionCandidate, PROPOSE_ADD_SHOPPING_ITEM};

/// Payload keys an action may carry.
const ALLOWED_PAYLOAD_KEYS: &[&str] = &["item", "idempotency_key"];
/// Keys the entity payload may carry.
const ALLOWED_ITEM_KEYS: &[&str] = &["name", "quantity", "unit", "list_id"];
/// Entity-name length bounds, in trimmed characters.
const MIN_ITEM_NAME_LEN: usize = 1;
const MAX_ITEM_NAME_LEN: usize = 120;
/// Candidates below this confidence are rejected; absent confidence passes.
const MIN_CONFIDENCE: f64 = 0.6;

/// Why a candidate was accepted or rejected. Order of the reject variants
/// mirrors the gate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    CorridorDisabled,
    CandidateMissing,
    PolicyDisabled,
    CorridorMismatch,
    InvalidSchema,
    InvalidItemName,
    ListIdUnknown,
    LowConfidence,
    Accepted,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CorridorDisabled => "corridor_disabled",
            Self::CandidateMissing => "candidate_missing",
            Self::PolicyDisabled => "policy_disabled",
            Self::CorridorMismatch => "corridor_mismatch",
            Self::InvalidSchema => "invalid_schema",
            Self::InvalidItemName => "invalid_item_name",
            Self::ListIdUnknown => "list_id_unknown",
            Self::LowConfidence => "low_confidence",
            Self::Accepted => "accepted",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence bucket for audit summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    Missing,
    Low,
    Medium,
    High,
}

/// Redacted candidate summary: counts, flags and buckets only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub action_count: usize,
    pub entity_keys_count: usize,
    pub has_list_id: bool,
    pub item_name_len: usize,
    pub confidence_bucket: ConfidenceBucket,
}

impl RiskSummary {
    /// Summary of "no candidate".
    pub fn missing() -> Self {
        Self {
            action_count: 0,
            entity_keys_count: 0,
            has_list_id: false,
            item_name_len: 0,
            confidence_bucket: ConfidenceBucket::Missing,
        }
    }
}

/// The verdict plus the summary that is emitted regardless of outcome.
#[derive(Debug, Clone)]
pub struct AcceptanceVerdict {
    pub accepted: bool,
    pub reason: ReasonCode,
    pub summary: RiskSummary,
}

/// Evaluate a candidate against the corridor rules.
///
/// `known_lists` is the set of list references the household actually has;
/// `None` means the context provided none, which rejects any candidate that
/// carries a list reference (fail-closed).
pub fn evaluate_candidate(
    candidate: Option<&DecisionCandidate>,
    corridor_intent: Option<&str>,
    policy_enabled: bool,
    known_lists: Option<&BTreeSet<String>>,
) -> AcceptanceVerdict {
    let summary = build_summary(candidate);
    let reject = |reason: ReasonCode, summary: RiskSummary| AcceptanceVerdict {
        accepted: false,
        reason,
        summary,
    };

    let Some(corridor_intent) = corridor_intent else {
        return reject(ReasonCode::CorridorDisabled, summary);
    };
    let Some(candidate) = candidate else {
        return reject(ReasonCode::CandidateMissing, summary);
    };
    if !policy_enabled {
        return reject(ReasonCode::PolicyDisabled, summary);
    }
    if candidate.intent != corridor_intent
        || candidate
            .job_type
            .as_deref()
            .is_some_and(|job_type| job_type != corridor_intent)
    {
        return reject(ReasonCode::CorridorMismatch, summary);
    }
    if !validate_shape(candidate) {
        return reject(ReasonCode::InvalidSchema, summary);
    }
    if !validate_item_name(candidate) {
        return reject(ReasonCode::InvalidItemName, summary);
    }
    if !validate_list_id(candidate, known_lists) {
        return reject(ReasonCode::ListIdUnknown, summary);
    }
    if !passes_confidence(candidate) {
        return reject(ReasonCode::LowConfidence, summary);
    }

    AcceptanceVerdict {
        accepted: true,
        reason: ReasonCode::Accepted,
        summary,
    }
}

fn validate_shape(candidate: &DecisionCandidate) -> bool {
    if candidate.proposed_actions.len() != 1 {
        return false;
    }
    let action = &candidate.proposed_actions[0];
    if action.action != PROPOSE_ADD_SHOPPING_ITEM {
        return false;
    }
    let Some(payload) = action.payload.as_object() else {
        return false;
    };
    if payload
        .keys()
        .any(|key| !ALLOWED_PAYLOAD_KEYS.contains(&key.as_str()))
    {
        return false;
    }
    let Some(item) = payload.get("item").and_then(Value::as_object) else {
        return false;
    };
    if item
        .keys()
        .any(|key| !ALLOWED_ITEM_KEYS.contains(&key.as_str()))
    {
        return false;
    }
    validate_item_payload(item)
}

fn validate_item_payload(item: &serde_json::Map<String, Value>) -> bool {
    match item.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => {}
        _ => return false,
    }
    for key in ["quantity", "unit", "list_id"] {
        match item.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(value)) if !value.trim().is_empty() => {}
            _ => return false,
        }
    }
    true
}

fn validate_item_name(candidate: &DecisionCandidate) -> bool {
    let Some(item) = extract_item(candidate) else {
        return false;
    };
    let Some(name) = item.get("name").and_then(Value::as_str) else {
        return false;
    };
    let length = name.trim().chars().count();
    (MIN_ITEM_NAME_LEN..=MAX_ITEM_NAME_LEN).contains(&length)
}

fn validate_list_id(
    candidate: &DecisionCandidate,
    known_lists: Option<&BTreeSet<String>>,
) -> bool {
    let Some(item) = extract_item(candidate) else {
        return false;
    };
    match item.get("list_id") {
        None | Some(Value::Null) => true,
        Some(Value::String(list_id)) if !list_id.trim().is_empty() => known_lists
            .map(|known| known.contains(list_id))
            .unwrap_or(false),
        _ => false,
    }
}

fn passes_confidence(candidate: &DecisionCandidate) -> bool {
    match candidate.confidence {
        None => true,
        Some(confidence) => confidence >= MIN_CONFIDENCE,
    }
}

fn extract_item(candidate: &DecisionCandidate) -> Option<&serde_json::Map<String, Value>> {
    candidate
        .proposed_actions
        .first()?
        .payload
        .get("item")?
        .as_object()
}

fn build_summary(candidate: Option<&DecisionCandidate>) -> RiskSummary {
    let Some(candidate) = candidate else {
        return RiskSummary::missing();
    };
    let mut summary = RiskSummary {
        action_count: candidate.proposed_actions.len(),
        entity_keys_count: 0,
        has_list_id: false,
        item_name_len: 0,
        confidence_bucket: bucket_confidence(candidate.confidence),
    };
    if let Some(item) = extract_item(candidate) {
        summary.entity_keys_count = item.len();
        summary.item_name_len = item
            .get("name")
            .and_then(Value::as_str)
            .map(|name| name.trim().chars().count())
            .unwrap_or(0);
        summary.has_list_id = matches!(
            item.get("list_id"),
            Some(Value::String(list_id)) if !list_id.trim().is_empty()
        );
    }
    summary
}

fn bucket_confidence(confidence: Option<f64>) -> ConfidenceBucket {
    match confidence {
        None => ConfidenceBucket::Missing,
        Some(c) if c >= 0.8 => ConfidenceBucket::High,
        Some(c) if c >= MIN_CONFIDENCE => ConfidenceBucket::Medium,
        Some(_) => ConfidenceBucket::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProposedAction;
    use serde_json::json;

    fn candidate(item_name: &str, confidence: Option<f64>, list_id: Option<&str>) -> DecisionCandidate {
        let mut item = serde_json::Map::new();
        item.insert("name".to_string(), json!(item_name));
        if let Some(list_id) = list_id {
            item.insert("list_id".to_string(), json!(list_id));
        }
        DecisionCandidate {
            intent: "add_shopping_item".to_string(),
            job_type: Some("add_shopping_item".to_string()),
            proposed_actions: vec![ProposedAction {
                action: PROPOSE_ADD_SHOPPING_ITEM.to_string(),
                payload: json!({ "item": item }),
            }],
            confidence,
            model_meta: None,
            latency_ms: 12,
        }
    }

    fn known(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn valid_candidate_is_accepted() {
        let candidate = candidate("молоко", Some(0.8), None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, ReasonCode::Accepted);
        assert_eq!(verdict.summary.action_count, 1);
    }

    #[test]
    fn disabled_corridor_wins_over_everything() {
        let verdict = evaluate_candidate(None, None, true, None);
        assert_eq!(verdict.reason, ReasonCode::CorridorDisabled);
        let candidate = candidate("молоко", Some(0.1), None);
        let verdict = evaluate_candidate(Some(&candidate), None, false, None);
        assert_eq!(verdict.reason, ReasonCode::CorridorDisabled);
    }

    #[test]
    fn missing_candidate_is_reported_before_policy() {
        let verdict = evaluate_candidate(None, Some("add_shopping_item"), false, None);
        assert_eq!(verdict.reason, ReasonCode::CandidateMissing);
    }

    #[test]
    fn disabled_policy_rejects() {
        let candidate = candidate("молоко", Some(0.9), None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), false, None);
        assert_eq!(verdict.reason, ReasonCode::PolicyDisabled);
    }

    #[test]
    fn wrong_intent_is_corridor_mismatch() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.intent = "create_task".to_string();
        wrong.job_type = Some("create_task".to_string());
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::CorridorMismatch);
    }

    #[test]
    fn mismatched_job_type_alone_is_corridor_mismatch() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.job_type = Some("create_task".to_string());
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::CorridorMismatch);
    }

    #[test]
    fn wrong_action_kind_is_invalid_schema() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.proposed_actions[0].action = "propose_create_task".to_string();
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidSchema);
    }

    #[test]
    fn two_actions_are_invalid_schema() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.proposed_actions.push(wrong.proposed_actions[0].clone());
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidSchema);
    }

    #[test]
    fn unknown_payload_key_is_invalid_schema() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.proposed_actions[0].payload = json!({
            "item": {"name": "молоко"},
            "priority": "high",
        });
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidSchema);
    }

    #[test]
    fn unknown_item_key_is_invalid_schema() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.proposed_actions[0].payload = json!({
            "item": {"name": "молоко", "brand": "любой"},
        });
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidSchema);
    }

    #[test]
    fn blank_optional_field_is_invalid_schema() {
        let mut wrong = candidate("молоко", Some(0.9), None);
        wrong.proposed_actions[0].payload = json!({
            "item": {"name": "молоко", "quantity": "   "},
        });
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidSchema);
    }

    #[test]
    fn overlong_name_is_invalid_item_name() {
        let long_name = "м".repeat(121);
        let wrong = candidate(&long_name, Some(0.9), None);
        let verdict = evaluate_candidate(Some(&wrong), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::InvalidItemName);
        assert_eq!(verdict.summary.item_name_len, 121);
    }

    #[test]
    fn name_at_limit_passes() {
        let candidate = candidate(&"м".repeat(120), Some(0.9), None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert!(verdict.accepted);
    }

    #[test]
    fn confidence_below_threshold_rejected() {
        let candidate = candidate("молоко", Some(0.59), None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::LowConfidence);
    }

    #[test]
    fn confidence_at_threshold_accepted() {
        let candidate = candidate("молоко", Some(0.60), None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert!(verdict.accepted);
    }

    #[test]
    fn absent_confidence_accepted() {
        let candidate = candidate("молоко", None, None);
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert!(verdict.accepted);
        assert_eq!(verdict.summary.confidence_bucket, ConfidenceBucket::Missing);
    }

    #[test]
    fn known_list_reference_accepted() {
        let candidate = candidate("молоко", Some(0.8), Some("list-1"));
        let verdict = evaluate_candidate(
            Some(&candidate),
            Some("add_shopping_item"),
            true,
            Some(&known(&["list-1"])),
        );
        assert!(verdict.accepted);
        assert!(verdict.summary.has_list_id);
    }

    #[test]
    fn unknown_list_reference_rejected() {
        let candidate = candidate("молоко", Some(0.8), Some("unknown-list"));
        let verdict = evaluate_candidate(
            Some(&candidate),
            Some("add_shopping_item"),
            true,
            Some(&known(&["list-1"])),
        );
        assert_eq!(verdict.reason, ReasonCode::ListIdUnknown);
    }

    #[test]
    fn list_reference_without_context_rejected_fail_closed() {
        let candidate = candidate("молоко", Some(0.8), Some("list-1"));
        let verdict = evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, None);
        assert_eq!(verdict.reason, ReasonCode::ListIdUnknown);

        let empty = known(&[]);
        let verdict =
            evaluate_candidate(Some(&candidate), Some("add_shopping_item"), true, Some(&empty));
        assert_eq!(verdict.reason, ReasonCode::ListIdUnknown);
    }

    #[test]
    fn confidence_buckets_follow_thresholds() {
        assert_eq!(bucket_confidence(None), ConfidenceBucket::Missing);
        assert_eq!(bucket_confidence(Some(0.59)), ConfidenceBucket::Low);
        assert_eq!(bucket_confidence(Some(0.6)), ConfidenceBucket::Medium);
        assert_eq!(bucket_confidence(Some(0.79)), ConfidenceBucket::Medium);
        assert_eq!(bucket_confidence(Some(0.8)), ConfidenceBucket::High);
    }

    #[test]
    fn summary_never_contains_raw_item_name() {
        let candidate = candidate("молоко", Some(0.9), Some("list-1"));
        let verdict = evaluate_candidate(
            Some(&candidate),
            Some("add_shopping_item"),
            true,
            Some(&known(&["list-1"])),
        );
        let serialized = serde_json::to_string(&verdict.summary).unwrap();
        assert!(!serialized.contains("молоко"));
        assert!(!serialized.contains("list-1"));
    }
}
