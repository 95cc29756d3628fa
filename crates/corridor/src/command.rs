//! Domain types for commands and decisions.
//!
//! These mirror the JSON shapes the surrounding pipeline exchanges. The
//! corridor never trusts LLM-shaped data: a [`ProposedAction`] payload stays
//! a [`serde_json::Value`] until the acceptance gates have validated it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One incoming user command plus the capability and household context the
/// front end resolved for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub context: CommandContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandContext {
    #[serde(default)]
    pub household: Household,
}

impl CommandContext {
    /// The set of shopping-list ids a candidate may legitimately reference.
    pub fn known_list_ids(&self) -> BTreeSet<String> {
        self.household
            .shopping_lists
            .iter()
            .filter(|list| !list.list_id.trim().is_empty())
            .map(|list| list.list_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Household {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub shopping_lists: Vec<ShoppingList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingList {
    pub list_id: String,
    #[serde(default)]
    pub name: String,
}

/// What the pipeline decided to do with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    StartJob,
    Clarify,
}

/// A deterministic or corridor-accepted decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub payload: DecisionPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proposed_actions: Vec<ProposedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// An action proposal. The payload is LLM-shaped data and is validated by
/// the acceptance gates, never trusted structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Decision {
    pub fn start_job(
        job_type: impl Into<String>,
        proposed_actions: Vec<ProposedAction>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            action: DecisionAction::StartJob,
            trace_id: None,
            payload: DecisionPayload {
                job_type: Some(job_type.into()),
                proposed_actions,
                question: None,
                missing_fields: Vec::new(),
                explanation: Some(explanation.into()),
            },
        }
    }

    pub fn clarify(question: impl Into<String>, missing_fields: Vec<String>) -> Self {
        Self {
            action: DecisionAction::Clarify,
            trace_id: None,
            payload: DecisionPayload {
                job_type: None,
                proposed_actions: Vec::new(),
                question: Some(question.into()),
                missing_fields,
                explanation: None,
            },
        }
    }

    /// Whether this is a `start_job` decision for the given job type.
    pub fn starts_job(&self, job_type: &str) -> bool {
        self.action == DecisionAction::StartJob
            && self.payload.job_type.as_deref() == Some(job_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_list_ids_skip_blank_entries() {
        let context = CommandContext {
            household: Household {
                members: vec![],
                shopping_lists: vec![
                    ShoppingList {
                        list_id: "list-1".to_string(),
                        name: "Основной".to_string(),
                    },
                    ShoppingList {
                        list_id: "   ".to_string(),
                        name: "broken".to_string(),
                    },
                ],
            },
        };
        let known = context.known_list_ids();
        assert_eq!(known.len(), 1);
        assert!(known.contains("list-1"));
    }

    #[test]
    fn starts_job_matches_action_and_type() {
        let decision = Decision::start_job("add_shopping_item", vec![], "ок");
        assert!(decision.starts_job("add_shopping_item"));
        assert!(!decision.starts_job("create_task"));
        assert!(!Decision::clarify("что сделать?", vec![]).starts_job("add_shopping_item"));
    }

    #[test]
    fn decision_serializes_snake_case_action() {
        let decision = Decision::start_job("add_shopping_item", vec![], "ок");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "start_job");
    }
}
