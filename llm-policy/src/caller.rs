//! The LLM caller boundary.
//!
//! The host application supplies one implementation of [`LlmCaller`]; the
//! runtime never talks to a provider any other way. The caller is handed to
//! [`crate::runtime::EscalationRunner`] as an explicit constructor dependency
//! so tests and concurrent call sites never share registration state.

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::CallSpec;
use crate::errors::TaskErrorKind;

/// Failure classes a caller may report. Everything that is not a timeout or
/// an unavailability signal is treated as a generic LLM error.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM unavailable: {0}")]
    Unavailable(String),
    #[error("LLM error: {0}")]
    Other(String),
}

impl CallError {
    /// Map this transport failure into the runtime's error taxonomy.
    pub fn task_kind(&self) -> TaskErrorKind {
        match self {
            Self::Timeout => TaskErrorKind::Timeout,
            Self::Unavailable(_) => TaskErrorKind::LlmUnavailable,
            Self::Other(_) => TaskErrorKind::LlmError,
        }
    }
}

/// Single-operation capability: send one prompt with the given parameters,
/// return the raw completion text.
///
/// Implementations must report timeouts and unavailability through the
/// matching [`CallError`] variants — the escalation rules depend on the
/// distinction. Dropping the returned future must abandon the request; the
/// runtime relies on that to enforce deadlines without leaking work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn call(&self, spec: &CallSpec, prompt: &str) -> Result<String, CallError>;
}
