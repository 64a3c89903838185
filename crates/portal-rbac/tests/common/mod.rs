use portal_rbac::store::memory::InMemoryPolicyStore;
use portal_rbac::{EffectPolicy, PolicyEvaluator, PolicyStore, seed_default_policies};
use std::sync::Arc;

pub async fn seeded_store() -> Arc<InMemoryPolicyStore> {
    let store = Arc::new(InMemoryPolicyStore::new());
    seed_default_policies(store.as_ref())
        .await
        .expect("seed defaults");
    store
}

pub async fn seeded_evaluator(effect_policy: EffectPolicy) -> PolicyEvaluator {
    let store: Arc<dyn PolicyStore> = seeded_store().await;
    PolicyEvaluator::with_effect_policy(store, effect_policy)
}
