//! In-memory implementation of the policy store.
//!
//! # Purpose
//! Keeps the policy set in a copy-on-write [`PolicySnapshot`] guarded by a
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments that re-seed the policy set on every start
//!
//! # Durability and consistency
//! - **Not durable**: all rules are lost on process restart.
//! - Writers clone the current snapshot, apply the insert, and swap the `Arc`
//!   while holding the write lock. Readers clone the `Arc` under a read lock and
//!   evaluate without holding any lock.
//! - A rejected insert (cycle, invalid rule) leaves the published snapshot
//!   untouched.
use super::{PolicyStore, record_counts};
use crate::policy::{GroupingRule, PolicyRule};
use crate::snapshot::{PolicyDocument, PolicySnapshot};
use crate::{AddOutcome, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryPolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document, replaying it through the insert checks.
    pub fn from_document(document: PolicyDocument) -> StoreResult<Self> {
        let snapshot = PolicySnapshot::from_document(document)?;
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    async fn update<F>(&self, apply: F) -> StoreResult<AddOutcome>
    where
        F: FnOnce(&mut PolicySnapshot) -> StoreResult<AddOutcome> + Send,
    {
        let mut current = self.current.write().await;
        let mut next = PolicySnapshot::clone(&current);
        let outcome = apply(&mut next)?;
        if outcome.is_inserted() {
            record_counts(&next);
            *current = Arc::new(next);
        }
        Ok(outcome)
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn add_policy(&self, rule: PolicyRule) -> StoreResult<AddOutcome> {
        // Fast path: duplicates never need a copy of the snapshot.
        if self.current.read().await.contains_rule(&rule) {
            tracing::debug!(subject = %rule.subject, domain = %rule.domain, "duplicate policy ignored");
            return Ok(AddOutcome::Duplicate);
        }
        self.update(move |snapshot| snapshot.insert_rule(rule)).await
    }

    async fn add_grouping_policy(&self, grouping: GroupingRule) -> StoreResult<AddOutcome> {
        if self.current.read().await.contains_grouping(&grouping) {
            tracing::debug!(child = %grouping.child, parent = %grouping.parent, "duplicate grouping ignored");
            return Ok(AddOutcome::Duplicate);
        }
        self.update(move |snapshot| snapshot.insert_grouping(grouping))
            .await
    }

    async fn snapshot(&self) -> StoreResult<Arc<PolicySnapshot>> {
        Ok(self.current.read().await.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
