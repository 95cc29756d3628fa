//! Corridor configuration.
//!
//! The corridor is off unless explicitly enabled, and only ever opens for
//! intents in the closed allowlist — an unknown configured intent behaves
//! exactly like a disabled corridor.

use std::env;

use llm_policy::ProfileId;
use serde::{Deserialize, Serialize};

pub const ENV_ENABLED: &str = "PARTIAL_TRUST_ENABLED";
pub const ENV_INTENT: &str = "PARTIAL_TRUST_INTENT";
pub const ENV_SAMPLE_RATE: &str = "PARTIAL_TRUST_SAMPLE_RATE";
pub const ENV_TIMEOUT_MS: &str = "PARTIAL_TRUST_TIMEOUT_MS";
pub const ENV_PROFILE_ID: &str = "PARTIAL_TRUST_PROFILE_ID";

/// The single intent the corridor is allowed to augment today.
pub const DEFAULT_CORRIDOR_INTENT: &str = "add_shopping_item";

/// Closed allowlist of corridor intents.
pub const ALLOWED_CORRIDOR_INTENTS: &[&str] = &[DEFAULT_CORRIDOR_INTENT];

const DEFAULT_SAMPLE_RATE: f64 = 0.01;
const DEFAULT_BUDGET_MS: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorConfig {
    pub enabled: bool,
    /// Configured intent; gated through [`CorridorConfig::corridor_intent`].
    pub intent: String,
    /// Fraction of traffic entering the corridor, clamped to [0, 1].
    pub sample_rate: f64,
    /// Overall budget for one candidate generation, milliseconds.
    /// Zero means unbounded — never acceptable on request-serving paths.
    pub budget_ms: u64,
    /// Starting profile override for corridor tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileId>,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            intent: DEFAULT_CORRIDOR_INTENT.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            budget_ms: DEFAULT_BUDGET_MS,
            profile: None,
        }
    }
}

impl CorridorConfig {
    pub fn from_env() -> Self {
        let enabled = env_flag(ENV_ENABLED);
        if !enabled {
            return Self {
                enabled: false,
                sample_rate: 0.0,
                budget_ms: 0,
                ..Self::default()
            };
        }
        let intent = env::var(ENV_INTENT)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CORRIDOR_INTENT.to_string());
        let sample_rate = env::var(ENV_SAMPLE_RATE)
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let budget_ms = env::var(ENV_TIMEOUT_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let profile = env::var(ENV_PROFILE_ID)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(ProfileId::new);
        Self {
            enabled,
            intent,
            sample_rate,
            budget_ms,
            profile,
        }
    }

    /// The active corridor intent: `None` when the corridor is disabled or
    /// the configured intent is not allowlisted.
    pub fn corridor_intent(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        ALLOWED_CORRIDOR_INTENTS
            .iter()
            .copied()
            .find(|allowed| *allowed == self.intent)
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_yields_no_intent() {
        let config = CorridorConfig::default();
        assert_eq!(config.corridor_intent(), None);
    }

    #[test]
    fn enabled_config_yields_allowlisted_intent() {
        let config = CorridorConfig {
            enabled: true,
            ..CorridorConfig::default()
        };
        assert_eq!(config.corridor_intent(), Some(DEFAULT_CORRIDOR_INTENT));
    }

    #[test]
    fn unknown_intent_behaves_like_disabled() {
        let config = CorridorConfig {
            enabled: true,
            intent: "create_task".to_string(),
            ..CorridorConfig::default()
        };
        assert_eq!(config.corridor_intent(), None);
    }
}
