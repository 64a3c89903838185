use crate::policy::{GroupingRule, PolicyRule};
use crate::snapshot::PolicySnapshot;
use crate::{AddOutcome, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;

pub mod file;
pub mod memory;

/// Holder of authorization rules and role groupings.
///
/// Writes are append-only and idempotent. Readers take an `Arc` snapshot, so a
/// concurrent write never produces a torn view for an in-flight evaluation.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn add_policy(&self, rule: PolicyRule) -> StoreResult<AddOutcome>;
    async fn add_grouping_policy(&self, grouping: GroupingRule) -> StoreResult<AddOutcome>;
    async fn snapshot(&self) -> StoreResult<Arc<PolicySnapshot>>;

    /// Rules reachable from `role` in `domain` through role and portal inheritance.
    async fn list_rules_for(&self, role: &str, domain: &str) -> StoreResult<Vec<PolicyRule>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .rules_for(role, domain)
            .into_iter()
            .map(|matched| matched.rule)
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

fn record_counts(snapshot: &PolicySnapshot) {
    metrics::gauge!("rbac_rules_total").set(snapshot.rule_count() as f64);
    metrics::gauge!("rbac_groupings_total").set(snapshot.grouping_count() as f64);
}
