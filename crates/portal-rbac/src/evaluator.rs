//! Authorization decisions over a policy store.
//!
//! # Purpose and responsibility
//! Answers "can `role` perform `action` on `object` within `domain`?" by
//! resolving the role's inheritance closure in the current store snapshot and
//! merging the matched rules under the configured [`EffectPolicy`].
//!
//! # Where it fits
//! Route guards and API middleware hold a shared [`PolicyEvaluator`] built at
//! startup (see [`crate::runtime::bootstrap`]) and call [`PolicyEvaluator::evaluate`]
//! per request. UI session setup calls [`PolicyEvaluator::effective_permissions`]
//! to populate the client-side permission list.
//!
//! # Key invariants
//! - Default deny: no matched rule means [`Decision::Deny`].
//! - Under [`EffectPolicy::DenyOverride`] any matched deny wins, no matter how
//!   far up the hierarchy the competing allow sits.
//! - Store failures never surface to the caller; they resolve to `Deny`.
//!
//! # Security considerations
//! - Explicit rules on the requesting role are never dropped in favour of
//!   inherited ones; both enter the merge step.
use crate::snapshot::{MatchedRule, PolicySnapshot};
use crate::store::PolicyStore;
use crate::{Decision, Effect, EffectPolicy};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Decision plus the rules that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// Every matched rule, nearest first.
    pub matched: Vec<MatchedRule>,
    /// False when the store could not be read and the decision is the fail-closed default.
    pub store_available: bool,
}

#[derive(Clone)]
pub struct PolicyEvaluator {
    store: Arc<dyn PolicyStore>,
    effect_policy: EffectPolicy,
}

impl PolicyEvaluator {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self::with_effect_policy(store, EffectPolicy::default())
    }

    pub fn with_effect_policy(store: Arc<dyn PolicyStore>, effect_policy: EffectPolicy) -> Self {
        Self {
            store,
            effect_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    pub fn effect_policy(&self) -> EffectPolicy {
        self.effect_policy
    }

    pub async fn evaluate(&self, role: &str, domain: &str, object: &str, action: &str) -> Decision {
        self.explain(role, domain, object, action).await.decision
    }

    pub async fn explain(&self, role: &str, domain: &str, object: &str, action: &str) -> Evaluation {
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                metrics::counter!("rbac_store_errors_total").increment(1);
                tracing::warn!(
                    error = %err,
                    backend = self.store.backend_name(),
                    role,
                    domain,
                    object,
                    action,
                    "policy store unavailable; denying"
                );
                record_decision(Decision::Deny);
                return Evaluation {
                    decision: Decision::Deny,
                    matched: Vec::new(),
                    store_available: false,
                };
            }
        };

        let matched = snapshot.matching_rules(role, domain, object, action);
        let decision = resolve(self.effect_policy, &matched);
        tracing::debug!(
            role,
            domain,
            object,
            action,
            matched = matched.len(),
            decision = %decision,
            "authorization evaluated"
        );
        record_decision(decision);
        Evaluation {
            decision,
            matched,
            store_available: true,
        }
    }

    /// Sorted `action:object` strings the role is allowed within `domain`.
    ///
    /// Wildcard grants are reported as written (`*:licenses`, `manage:*`).
    /// Returns an empty list if the store cannot be read.
    pub async fn effective_permissions(&self, role: &str, domain: &str) -> Vec<String> {
        match self.store.snapshot().await {
            Ok(snapshot) => effective_permissions(&snapshot, self.effect_policy, role, domain),
            Err(err) => {
                metrics::counter!("rbac_store_errors_total").increment(1);
                tracing::warn!(error = %err, role, domain, "policy store unavailable; no permissions");
                Vec::new()
            }
        }
    }
}

/// Merge matched rules into a decision.
pub fn resolve(effect_policy: EffectPolicy, matched: &[MatchedRule]) -> Decision {
    let considered: Vec<&MatchedRule> = match effect_policy {
        EffectPolicy::DenyOverride => matched.iter().collect(),
        EffectPolicy::NearestWins => {
            let Some(nearest) = matched.iter().map(|m| m.distance).min() else {
                return Decision::Deny;
            };
            matched.iter().filter(|m| m.distance == nearest).collect()
        }
    };

    if considered.iter().any(|m| m.rule.effect == Effect::Deny) {
        Decision::Deny
    } else if considered.iter().any(|m| m.rule.effect == Effect::Allow) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

pub fn effective_permissions(
    snapshot: &PolicySnapshot,
    effect_policy: EffectPolicy,
    role: &str,
    domain: &str,
) -> Vec<String> {
    let reachable = snapshot.rules_for(role, domain);
    // Check every allow candidate as a query of its own so denies anywhere in
    // the closure are applied exactly as `evaluate` would apply them.
    let mut perms: BTreeSet<String> = BTreeSet::new();
    for candidate in reachable.iter().filter(|m| m.rule.effect == Effect::Allow) {
        let object = candidate.rule.object.as_str();
        let action = candidate.rule.action.as_str();
        let matched: Vec<MatchedRule> = reachable
            .iter()
            .filter(|m| covers(m, object, action))
            .cloned()
            .collect();
        if resolve(effect_policy, &matched).is_allowed() {
            perms.insert(candidate.rule.permission_string());
        }
    }
    perms.into_iter().collect()
}

// A literal `*` in the candidate stands for "any", so only rules that match
// every value it could take (another `*`) or deny some of them count.
fn covers(matched: &MatchedRule, object: &str, action: &str) -> bool {
    let rule = &matched.rule;
    let object_hit = rule.object.matches(object) || (object == "*" && rule.effect == Effect::Deny);
    let action_hit = rule.action.matches(action) || (action == "*" && rule.effect == Effect::Deny);
    object_hit && action_hit
}

fn record_decision(decision: Decision) {
    metrics::counter!("rbac_decisions_total", "decision" => decision.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{GroupingRule, PolicyRule};
    use crate::snapshot::PolicySnapshot;
    use crate::store::memory::InMemoryPolicyStore;
    use crate::{AddOutcome, StoreError, StoreResult};
    use async_trait::async_trait;

    fn matched(effect: Effect, distance: u32) -> MatchedRule {
        MatchedRule {
            rule: PolicyRule::for_role("r", "obj", "act", effect, "d").expect("rule"),
            distance,
        }
    }

    #[test]
    fn deny_override_ignores_distance() {
        let rules = vec![matched(Effect::Allow, 0), matched(Effect::Deny, 3)];
        assert_eq!(resolve(EffectPolicy::DenyOverride, &rules), Decision::Deny);
    }

    #[test]
    fn nearest_wins_prefers_closest_rule() {
        let rules = vec![matched(Effect::Allow, 0), matched(Effect::Deny, 3)];
        assert_eq!(resolve(EffectPolicy::NearestWins, &rules), Decision::Allow);

        let rules = vec![matched(Effect::Deny, 0), matched(Effect::Allow, 1)];
        assert_eq!(resolve(EffectPolicy::NearestWins, &rules), Decision::Deny);

        let tie = vec![matched(Effect::Allow, 1), matched(Effect::Deny, 1)];
        assert_eq!(resolve(EffectPolicy::NearestWins, &tie), Decision::Deny);
    }

    #[test]
    fn nothing_matched_is_deny() {
        assert_eq!(resolve(EffectPolicy::DenyOverride, &[]), Decision::Deny);
        assert_eq!(resolve(EffectPolicy::NearestWins, &[]), Decision::Deny);
    }

    struct UnavailableStore;

    #[async_trait]
    impl PolicyStore for UnavailableStore {
        async fn add_policy(&self, _rule: PolicyRule) -> StoreResult<AddOutcome> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn add_grouping_policy(&self, _grouping: GroupingRule) -> StoreResult<AddOutcome> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn snapshot(&self) -> StoreResult<Arc<PolicySnapshot>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn health_check(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        fn is_durable(&self) -> bool {
            false
        }

        fn backend_name(&self) -> &'static str {
            "unavailable"
        }
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let evaluator = PolicyEvaluator::new(Arc::new(UnavailableStore));
        let evaluation = evaluator
            .explain("tech_admin", "tech_portal", "licenses", "full_control")
            .await;
        assert_eq!(evaluation.decision, Decision::Deny);
        assert!(!evaluation.store_available);
        assert!(evaluator
            .effective_permissions("tech_admin", "tech_portal")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn explain_lists_matched_rules() {
        let store = Arc::new(InMemoryPolicyStore::new());
        store
            .add_grouping_policy(GroupingRule::try_new("lead", "member", "d").expect("edge"))
            .await
            .expect("edge");
        store
            .add_policy(PolicyRule::for_role("member", "board", "view", Effect::Allow, "d").expect("rule"))
            .await
            .expect("rule");

        let evaluator = PolicyEvaluator::new(store);
        let evaluation = evaluator.explain("lead", "d", "board", "view").await;
        assert_eq!(evaluation.decision, Decision::Allow);
        assert!(evaluation.store_available);
        assert_eq!(evaluation.matched.len(), 1);
        assert_eq!(evaluation.matched[0].distance, 1);
        assert_eq!(evaluation.matched[0].rule.subject.as_str(), "member");
    }

    #[tokio::test]
    async fn effective_permissions_apply_denies_and_wildcards() {
        let store = Arc::new(InMemoryPolicyStore::new());
        for rule in [
            PolicyRule::for_role("ops", "servers", "*", Effect::Allow, "d"),
            PolicyRule::for_role("ops", "servers", "reboot", Effect::Deny, "d"),
            PolicyRule::for_role("ops", "dashboards", "view", Effect::Allow, "d"),
            PolicyRule::for_role("ops", "billing", "view", Effect::Allow, "d"),
            PolicyRule::for_role("ops", "billing", "view", Effect::Deny, "d"),
        ] {
            store.add_policy(rule.expect("rule")).await.expect("add");
        }

        let evaluator = PolicyEvaluator::new(store.clone());
        let perms = evaluator.effective_permissions("ops", "d").await;
        // `*:servers` is cut down by the reboot deny, so it is not reported.
        assert_eq!(perms, vec!["view:dashboards".to_string()]);
        assert_eq!(
            evaluator.evaluate("ops", "d", "servers", "restart").await,
            Decision::Allow
        );
        assert_eq!(
            evaluator.evaluate("ops", "d", "servers", "reboot").await,
            Decision::Deny
        );
    }
}
