//! Call catalog — routing from (task, profile) to concrete call parameters.
//!
//! The catalog is external configuration: it is deserialized once at startup
//! and consumed read-only by the runtime. Profiles are quality/cost tiers;
//! every task that can be routed declares one [`CallSpec`] per profile.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Profile every escalation chain ends on. Escalation policy, not a detail:
/// a run that starts below this tier gets exactly one shot at it.
pub const TOP_TIER_PROFILE: &str = "reliable";

/// Profile used when the caller does not ask for one.
pub const DEFAULT_PROFILE: &str = "cheap";

/// Logical quality/cost tier identifier (e.g. `"cheap"`, `"reliable"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn cheap() -> Self {
        Self(DEFAULT_PROFILE.to_string())
    }

    pub fn reliable() -> Self {
        Self(TOP_TIER_PROFILE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this profile is the designated escalation target.
    pub fn is_top_tier(&self) -> bool {
        self.0 == TOP_TIER_PROFILE
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Provider call parameters for one (task, profile) route. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpec {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-attempt deadline in milliseconds. Unset or zero means an
    /// unbounded wait — acceptable for offline use only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl CallSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
            base_url: None,
            project: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Catalog validation failure.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("profiles missing required profile: {0}")]
    MissingProfile(String),
    #[error("routing profile {profile} for task {task} not declared in profiles")]
    UndeclaredProfile { task: String, profile: String },
    #[error("routing spec for {task}.{profile} is missing {field}")]
    EmptyField {
        task: String,
        profile: String,
        field: &'static str,
    },
    #[error("catalog parse error: {0}")]
    Parse(String),
}

/// Read-only routing table: task id → profile → call parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyCatalog {
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub routing: BTreeMap<String, BTreeMap<String, CallSpec>>,
}

impl PolicyCatalog {
    /// Build an empty catalog and populate it with [`PolicyCatalog::insert_route`].
    pub fn new() -> Self {
        Self {
            profiles: vec![DEFAULT_PROFILE.to_string(), TOP_TIER_PROFILE.to_string()],
            routing: BTreeMap::new(),
        }
    }

    pub fn insert_route(
        &mut self,
        task_id: impl Into<String>,
        profile: impl Into<String>,
        spec: CallSpec,
    ) -> &mut Self {
        let profile = profile.into();
        if !self.profiles.contains(&profile) {
            self.profiles.push(profile.clone());
        }
        self.routing
            .entry(task_id.into())
            .or_default()
            .insert(profile, spec);
        self
    }

    pub fn resolve(&self, task_id: &str, profile: &ProfileId) -> Option<&CallSpec> {
        self.routing.get(task_id)?.get(profile.as_str())
    }

    pub fn route_exists(&self, task_id: &str, profile: &ProfileId) -> bool {
        self.resolve(task_id, profile).is_some()
    }

    /// Parse a catalog from its YAML configuration form.
    pub fn from_yaml_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_yaml::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from its JSON configuration form.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_json::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate the declared profiles against the routing table.
    ///
    /// Both the default and the top-tier profile must be declared, every
    /// routing entry must reference a declared profile, and every spec must
    /// carry a provider and a model.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for required in [DEFAULT_PROFILE, TOP_TIER_PROFILE] {
            if !self.profiles.iter().any(|p| p == required) {
                return Err(CatalogError::MissingProfile(required.to_string()));
            }
        }
        for (task, routes) in &self.routing {
            for (profile, spec) in routes {
                if !self.profiles.contains(profile) {
                    return Err(CatalogError::UndeclaredProfile {
                        task: task.clone(),
                        profile: profile.clone(),
                    });
                }
                if spec.provider.trim().is_empty() {
                    return Err(CatalogError::EmptyField {
                        task: task.clone(),
                        profile: profile.clone(),
                        field: "provider",
                    });
                }
                if spec.model.trim().is_empty() {
                    return Err(CatalogError::EmptyField {
                        task: task.clone(),
                        profile: profile.clone(),
                        field: "model",
                    });
                }
            }
        }
        Ok(())
    }
}
