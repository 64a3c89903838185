//! Default policy set for the ERP portals and the idempotent seeding routine.
//!
//! # Purpose
//! Populates a store with the platform's portal hierarchy, tech role hierarchy
//! and per-role grants/denials before any authorization query is served.
//!
//! # Key invariants
//! - Seeding is idempotent: a second run only reports duplicates.
//! - The first store error aborts seeding and is returned; startup must not
//!   continue with a partially seeded policy set.
//! - Groupings are written before rules so a cycle is detected before any
//!   grant lands.
use crate::policy::{GroupingRule, PolicyRule};
use crate::store::PolicyStore;
use crate::{AddOutcome, Effect, StoreError, StoreResult};

pub const TECH_PORTAL: &str = "tech_portal";
pub const ADMIN_PORTAL: &str = "admin_portal";
pub const CUSTOMER_PORTAL: &str = "customer_portal";
pub const VENDOR_PORTAL: &str = "vendor_portal";

/// `(subject, objects, actions, effect)`; one rule per object/action pair.
type Grant = (&'static str, &'static [&'static str], &'static [&'static str], Effect);

const DEFAULT_GRANTS: &[Grant] = &[
    ("tech_admin", &["admin_users", "tech_users"], &["create", "update", "delete"], Effect::Allow),
    ("tech_admin", &["licenses"], &["full_control"], Effect::Allow),
    ("tech_admin", &["system_config"], &["manage"], Effect::Allow),
    ("tech_manager", &["admin_users"], &["create", "update", "view"], Effect::Allow),
    ("tech_manager", &["tech_users"], &["create"], Effect::Deny),
    ("tech_manager", &["licenses"], &["issue", "revoke"], Effect::Allow),
    ("tech_developer", &["admin_users", "tech_users"], &["create"], Effect::Deny),
    ("tech_developer", &["system_logs"], &["view"], Effect::Allow),
    ("tech_developer", &["licenses"], &["view"], Effect::Allow),
    ("tech_support", &["admin_users", "tech_users"], &["create"], Effect::Deny),
    ("tech_support", &["system_status"], &["view"], Effect::Allow),
    ("admin_superuser", &["tech_users"], &["create", "update", "delete"], Effect::Deny),
    ("admin_superuser", &["admin_users"], &["create"], Effect::Allow),
    ("admin_superuser", &["customer_orgs", "vendor_orgs"], &["manage"], Effect::Allow),
    ("admin_superuser", &["licenses"], &["issue", "revoke"], Effect::Allow),
    ("customer_admin", &["rfq", "vessels", "employees"], &["manage"], Effect::Allow),
    ("customer_user", &["rfq", "vessels"], &["view"], Effect::Allow),
    ("vendor_admin", &["catalogue", "inventory", "quotation"], &["manage"], Effect::Allow),
    ("vendor_user", &["catalogue", "quotation"], &["view"], Effect::Allow),
];

/// Tech role chain, highest first; each role inherits the grants of the one
/// before it, so `tech_manager` inherits from `tech_admin`.
const TECH_ROLE_CHAIN: &[&str] = &["tech_admin", "tech_manager", "tech_developer", "tech_support"];

/// `(upper, lower)` portal inheritance edges.
const PORTAL_EDGES: &[(&str, &str)] = &[
    (TECH_PORTAL, ADMIN_PORTAL),
    (ADMIN_PORTAL, CUSTOMER_PORTAL),
    (ADMIN_PORTAL, VENDOR_PORTAL),
];

/// Portal a built-in role belongs to, derived from its name prefix.
pub fn portal_for_role(role: &str) -> Option<&'static str> {
    let (prefix, _) = role.split_once('_')?;
    match prefix {
        "tech" => Some(TECH_PORTAL),
        "admin" => Some(ADMIN_PORTAL),
        "customer" => Some(CUSTOMER_PORTAL),
        "vendor" => Some(VENDOR_PORTAL),
        _ => None,
    }
}

pub fn default_policies() -> StoreResult<Vec<PolicyRule>> {
    expand_grants(DEFAULT_GRANTS)
}

pub fn default_groupings() -> StoreResult<Vec<GroupingRule>> {
    let mut groupings = Vec::new();
    for (upper, lower) in PORTAL_EDGES {
        groupings.push(GroupingRule::portal(upper, lower)?);
    }
    for pair in TECH_ROLE_CHAIN.windows(2) {
        let (parent, child) = (pair[0], pair[1]);
        groupings.push(GroupingRule::try_new(child, parent, TECH_PORTAL)?);
    }
    Ok(groupings)
}

fn expand_grants(grants: &[Grant]) -> StoreResult<Vec<PolicyRule>> {
    let mut policies = Vec::new();
    for (subject, objects, actions, effect) in grants {
        let domain = portal_for_role(subject).ok_or_else(|| {
            StoreError::InvalidRule(format!("no portal for role prefix of `{subject}`"))
        })?;
        for object in *objects {
            for action in *actions {
                policies.push(PolicyRule::for_role(subject, object, action, *effect, domain)?);
            }
        }
    }
    Ok(policies)
}

/// Counts from one seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub duplicates: usize,
}

impl SeedReport {
    fn record(&mut self, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Inserted => self.inserted += 1,
            AddOutcome::Duplicate => self.duplicates += 1,
        }
    }
}

/// Write the platform's default policy set into `store`.
pub async fn seed_default_policies(store: &dyn PolicyStore) -> StoreResult<SeedReport> {
    let report = seed_policies(store, default_policies()?, default_groupings()?).await?;
    tracing::info!(
        backend = store.backend_name(),
        inserted = report.inserted,
        duplicates = report.duplicates,
        "seeded default rbac policies"
    );
    Ok(report)
}

/// Write an arbitrary policy set into `store`, groupings first.
pub async fn seed_policies(
    store: &dyn PolicyStore,
    policies: Vec<PolicyRule>,
    groupings: Vec<GroupingRule>,
) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();
    for grouping in groupings {
        let outcome = store.add_grouping_policy(grouping).await.inspect_err(|err| {
            tracing::error!(error = %err, "rbac seeding aborted");
        })?;
        report.record(outcome);
    }
    for policy in policies {
        let outcome = store.add_policy(policy).await.inspect_err(|err| {
            tracing::error!(error = %err, "rbac seeding aborted");
        })?;
        report.record(outcome);
    }
    Ok(report)
}
