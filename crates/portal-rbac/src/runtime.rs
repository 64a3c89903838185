//! Startup wiring: configuration in, ready evaluator out.
//!
//! # Purpose
//! Builds the configured store, seeds the default policy set and any
//! operator policy file, checks store health, and hands back a shared
//! [`PolicyEvaluator`]. Any failure aborts startup; a host must not serve
//! requests with a partially seeded policy set.
use crate::config::{RbacConfig, StoreBackend, load_policy_file};
use crate::evaluator::PolicyEvaluator;
use crate::seeder::{seed_default_policies, seed_policies};
use crate::store::PolicyStore;
use crate::store::file::FilePolicyStore;
use crate::store::memory::InMemoryPolicyStore;
use anyhow::Context;
use std::sync::Arc;

pub async fn build_store(config: &RbacConfig) -> anyhow::Result<Arc<dyn PolicyStore>> {
    let store: Arc<dyn PolicyStore> = match config.store {
        StoreBackend::Memory => Arc::new(InMemoryPolicyStore::new()),
        StoreBackend::File => Arc::new(
            FilePolicyStore::open(&config.store_path)
                .await
                .with_context(|| format!("open policy store {}", config.store_path.display()))?,
        ),
    };
    Ok(store)
}

pub async fn bootstrap(config: &RbacConfig) -> anyhow::Result<PolicyEvaluator> {
    let store = build_store(config).await?;

    let defaults = seed_default_policies(store.as_ref())
        .await
        .context("seed default rbac policies")?;

    let mut extra = None;
    if let Some(path) = &config.policy_file {
        let (policies, groupings) = load_policy_file(path)?;
        let report = seed_policies(store.as_ref(), policies, groupings)
            .await
            .with_context(|| format!("seed policy file {}", path.display()))?;
        extra = Some(report);
    }

    store
        .health_check()
        .await
        .context("policy store health check")?;

    tracing::info!(
        backend = store.backend_name(),
        durable = store.is_durable(),
        effect_policy = %config.effect_policy,
        defaults_inserted = defaults.inserted,
        extra_inserted = extra.map(|report| report.inserted).unwrap_or(0),
        "rbac policy engine ready"
    );
    Ok(PolicyEvaluator::with_effect_policy(
        store,
        config.effect_policy,
    ))
}
