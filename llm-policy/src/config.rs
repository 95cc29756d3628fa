//! Environment-driven runtime configuration and caller bootstrap.
//!
//! ## Precedence
//!
//! 1. Explicitly constructed [`RunnerOptions`] / callers (tests, embedders)
//! 2. Environment variables read by `from_env` / `bootstrap_http_caller`
//! 3. Built-in defaults (disabled, `cheap` starting profile)

use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use crate::caller::LlmCaller;
use crate::catalog::{ProfileId, DEFAULT_PROFILE};
use crate::http::HttpLlmCaller;
use crate::runtime::RunnerOptions;

pub const ENV_ENABLED: &str = "LLM_POLICY_ENABLED";
pub const ENV_PROFILE: &str = "LLM_POLICY_PROFILE";
pub const ENV_API_KEY: &str = "LLM_API_KEY";
pub const ENV_BASE_URL: &str = "LLM_BASE_URL";

/// Parse a boolean flag the way the platform's env files spell them.
pub(crate) fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

impl RunnerOptions {
    pub fn from_env() -> Self {
        let profile = env::var(ENV_PROFILE)
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        Self {
            enabled: env_flag(ENV_ENABLED),
            default_profile: ProfileId::new(profile),
        }
    }
}

/// Create the HTTP caller from the environment, if configured.
///
/// Guard order: the policy layer must be enabled, and an API key must be
/// set. Returns `Ok(None)` when either guard fails — the host then runs
/// with the corridor degraded rather than refusing to start.
pub fn bootstrap_http_caller() -> anyhow::Result<Option<Arc<dyn LlmCaller>>> {
    if !env_flag(ENV_ENABLED) {
        info!(target: "llm_policy", "policy layer disabled, skipping caller bootstrap");
        return Ok(None);
    }
    let api_key = env::var(ENV_API_KEY).unwrap_or_default();
    if api_key.is_empty() {
        warn!(target: "llm_policy", "{ENV_API_KEY} not set, LLM caller not configured");
        return Ok(None);
    }
    let caller = HttpLlmCaller::new(api_key)?;
    info!(target: "llm_policy", "LLM caller configured");
    Ok(Some(Arc::new(caller)))
}
