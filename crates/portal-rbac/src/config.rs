use crate::policy::{GroupingRule, PolicyRule};
use crate::{Effect, EffectPolicy};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_PATH: &str = "rbac-policies.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(anyhow!("unknown store backend: {other}")),
        }
    }
}

// Policy engine configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacConfig {
    pub store: StoreBackend,
    pub store_path: PathBuf,
    pub effect_policy: EffectPolicy,
    /// Extra policies and groupings seeded after the defaults.
    pub policy_file: Option<PathBuf>,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            effect_policy: EffectPolicy::DenyOverride,
            policy_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RbacConfigOverride {
    store: Option<String>,
    store_path: Option<String>,
    effect_policy: Option<String>,
    policy_file: Option<String>,
}

impl RbacConfig {
    pub fn from_env() -> Result<Self> {
        let store = std::env::var("PORTAL_RBAC_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<StoreBackend>()
            .with_context(|| "parse PORTAL_RBAC_STORE")?;
        let store_path = std::env::var("PORTAL_RBAC_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));
        let effect_policy = std::env::var("PORTAL_RBAC_EFFECT")
            .unwrap_or_else(|_| "deny_override".to_string())
            .parse::<EffectPolicy>()
            .map_err(|_| anyhow!("unknown effect policy"))
            .with_context(|| "parse PORTAL_RBAC_EFFECT")?;
        let policy_file = std::env::var("PORTAL_RBAC_POLICY_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self {
            store,
            store_path,
            effect_policy,
            policy_file,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("PORTAL_RBAC_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read PORTAL_RBAC_CONFIG: {path}"))?;
            let override_cfg: RbacConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse rbac config yaml")?;
            if let Some(value) = override_cfg.store {
                config.store = value.parse::<StoreBackend>().with_context(|| "parse store")?;
            }
            if let Some(value) = override_cfg.store_path {
                config.store_path = PathBuf::from(value);
            }
            if let Some(value) = override_cfg.effect_policy {
                config.effect_policy = value
                    .parse::<EffectPolicy>()
                    .map_err(|_| anyhow!("unknown effect policy: {value}"))
                    .with_context(|| "parse effect_policy")?;
            }
            if let Some(value) = override_cfg.policy_file {
                config.policy_file = Some(PathBuf::from(value));
            }
        }
        Ok(config)
    }
}

/// Operator-supplied rule set seeded on top of the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub policies: Vec<RawPolicyRule>,
    #[serde(default)]
    pub groupings: Vec<RawGroupingRule>,
}

#[derive(Debug, Deserialize)]
pub struct RawPolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
    pub effect: Effect,
    pub domain: String,
    /// Defaults to `subject`.
    pub acting_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawGroupingRule {
    pub child: String,
    pub parent: String,
    pub domain: String,
}

impl PolicyFile {
    /// Validate every entry; the first malformed one fails the whole file.
    pub fn into_rules(self) -> Result<(Vec<PolicyRule>, Vec<GroupingRule>)> {
        let mut policies = Vec::with_capacity(self.policies.len());
        for (idx, raw) in self.policies.into_iter().enumerate() {
            let acting_role = raw.acting_role.as_deref().unwrap_or(&raw.subject);
            let rule = PolicyRule::try_new(
                &raw.subject,
                &raw.object,
                &raw.action,
                raw.effect,
                &raw.domain,
                acting_role,
            )
            .with_context(|| format!("policies[{idx}]"))?;
            policies.push(rule);
        }
        let mut groupings = Vec::with_capacity(self.groupings.len());
        for (idx, raw) in self.groupings.into_iter().enumerate() {
            let grouping = GroupingRule::try_new(&raw.child, &raw.parent, &raw.domain)
                .with_context(|| format!("groupings[{idx}]"))?;
            groupings.push(grouping);
        }
        Ok((policies, groupings))
    }
}

pub fn load_policy_file(path: &Path) -> Result<(Vec<PolicyRule>, Vec<GroupingRule>)> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read policy file: {}", path.display()))?;
    let file: PolicyFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("parse policy file: {}", path.display()))?;
    file.into_rules()
        .with_context(|| format!("validate policy file: {}", path.display()))
}
