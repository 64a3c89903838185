//! Casbin export of the policy set.
//!
//! # Purpose and responsibility
//! Builds an in-memory Casbin enforcer that answers exactly like the native
//! evaluator under [`crate::EffectPolicy::DenyOverride`], for portal code that
//! already enforces through Casbin.
//!
//! # Key invariants and assumptions
//! - Casbin's domain role manager cannot express portal inheritance, so role
//!   and portal closures are resolved here and flattened into `p` lines keyed
//!   by the requesting role and domain. The model has no `g` section.
//! - Every `(role, domain)` pair that can reach a rule is materialized: each
//!   declared role in each domain, plus roles declared in a higher portal.
//! - The flattened policy keeps the rule effect in `p.eft`; the model's
//!   deny-override effect and the literal `*` object/action match reproduce
//!   the native merge step.
//!
//! # Security considerations
//! - Unknown roles have no `p` lines and are denied by Casbin as well.
//! - The enforcer is a point-in-time copy; rebuild it after store writes.
use crate::snapshot::PolicySnapshot;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi, Result};
use std::collections::BTreeSet;

const MODEL: &str = r#"
[request_definition]
r = sub, dom, obj, act

[policy_definition]
p = sub, dom, obj, act, eft

[policy_effect]
e = some(where (p.eft == allow)) && !some(where (p.eft == deny))

[matchers]
m = r.sub == p.sub && r.dom == p.dom && (p.obj == "*" || r.obj == p.obj) && (p.act == "*" || r.act == p.act)
"#;

pub fn casbin_model_string() -> &'static str {
    MODEL
}

/// Flattened `p` lines: `[role, domain, object, action, effect]`.
pub fn flattened_policies(snapshot: &PolicySnapshot) -> Vec<Vec<String>> {
    let mut lines: BTreeSet<Vec<String>> = BTreeSet::new();
    for (role, domain) in requesters(snapshot) {
        for matched in snapshot.rules_for(&role, &domain) {
            let rule = matched.rule;
            lines.insert(vec![
                role.clone(),
                domain.clone(),
                rule.object.to_string(),
                rule.action.to_string(),
                rule.effect.to_string(),
            ]);
        }
    }
    lines.into_iter().collect()
}

/// Build an in-memory Casbin enforcer mirroring the snapshot.
///
/// # Errors
/// - Returns Casbin errors for an invalid model or policy insertion failures.
pub async fn compile_enforcer(snapshot: &PolicySnapshot) -> Result<Enforcer> {
    // Step 1: Load the embedded deny-override model.
    let model = DefaultModel::from_str(MODEL).await?;
    // Step 2: Use an in-memory adapter; the store remains the source of truth.
    let adapter = MemoryAdapter::default();
    let mut enforcer = Enforcer::new(model, adapter).await?;

    // Step 3: Insert the flattened rules.
    for line in flattened_policies(snapshot) {
        enforcer.add_policy(line).await?;
    }
    tracing::debug!(
        policies = enforcer.get_policy().len(),
        "compiled casbin enforcer"
    );
    Ok(enforcer)
}

/// Every `(role, domain)` pair whose closure can contain a rule.
fn requesters(snapshot: &PolicySnapshot) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    let domains = snapshot.domains();
    for domain in &domains {
        for role in snapshot.declared_roles(domain.as_str()) {
            pairs.insert((role.to_string(), domain.to_string()));
        }
        for upper in snapshot.ancestor_portals(domain.as_str()) {
            for role in snapshot.declared_roles(upper.as_str()) {
                pairs.insert((role.to_string(), domain.to_string()));
            }
        }
    }
    pairs
}

/// Convenience wrapper around [`CoreApi::enforce`] with the request order used here.
pub fn enforce(
    enforcer: &Enforcer,
    role: &str,
    domain: &str,
    object: &str,
    action: &str,
) -> Result<bool> {
    enforcer.enforce((role, domain, object, action))
}
