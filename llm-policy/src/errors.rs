//! Task error taxonomy with escalation classification.
//!
//! Every failure the runtime can report is represented here. Callers query
//! [`TaskErrorKind::escalates`] instead of string matching.
//!
//! | Kind                       | Escalates | Notes                          |
//! |----------------------------|-----------|--------------------------------|
//! | `policy_disabled`          | no        | zero attempts                  |
//! | `policy_missing`           | no        | zero attempts                  |
//! | `llm_unavailable`          | no        | infrastructure trouble         |
//! | `timeout`                  | no        | infrastructure trouble         |
//! | `invalid_json`             | yes       | content trouble, repairable    |
//! | `schema_validation_failed` | yes       | content trouble, repairable    |
//! | `llm_error`                | no        | generic catch-all              |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal failure kind of an escalation run (or of one profile pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The policy layer is switched off; no attempt was made.
    PolicyDisabled,
    /// No catalog route exists for the requested task and profile.
    PolicyMissing,
    /// The caller reported the backend as unreachable.
    LlmUnavailable,
    /// The attempt deadline elapsed.
    Timeout,
    /// The completion was not a JSON object.
    InvalidJson,
    /// The completion was JSON but did not satisfy the task schema.
    SchemaValidationFailed,
    /// Any other caller failure.
    LlmError,
}

impl TaskErrorKind {
    /// Content failures are worth a repair retry and, after the profile is
    /// exhausted, an escalation to the top tier. Infrastructure failures
    /// terminate the run immediately.
    pub fn escalates(self) -> bool {
        matches!(self, Self::InvalidJson | Self::SchemaValidationFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PolicyDisabled => "policy_disabled",
            Self::PolicyMissing => "policy_missing",
            Self::LlmUnavailable => "llm_unavailable",
            Self::Timeout => "timeout",
            Self::InvalidJson => "invalid_json",
            Self::SchemaValidationFailed => "schema_validation_failed",
            Self::LlmError => "llm_error",
        }
    }
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
