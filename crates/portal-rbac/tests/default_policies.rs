mod common;

use common::{seeded_evaluator, seeded_store};
use portal_rbac::seeder::{ADMIN_PORTAL, CUSTOMER_PORTAL, TECH_PORTAL, VENDOR_PORTAL};
use portal_rbac::{
    Decision, EffectPolicy, GroupingRule, PolicyEvaluator, PolicyStore, StoreError,
    seed_default_policies,
};
use std::sync::Arc;

async fn decide(evaluator: &PolicyEvaluator, role: &str, domain: &str, object: &str, action: &str) -> Decision {
    evaluator.evaluate(role, domain, object, action).await
}

#[tokio::test]
async fn seeding_twice_matches_seeding_once() {
    let store = seeded_store().await;
    let once = store.snapshot().await.expect("snapshot");

    let report = seed_default_policies(store.as_ref()).await.expect("reseed");
    assert_eq!(report.inserted, 0);
    assert!(report.duplicates > 0);

    let twice = store.snapshot().await.expect("snapshot");
    assert_eq!(once.rules(), twice.rules());
    assert_eq!(once.groupings(), twice.groupings());
}

#[tokio::test]
async fn tech_manager_cannot_create_tech_users() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    let explanation = evaluator
        .explain("tech_manager", TECH_PORTAL, "tech_users", "create")
        .await;
    assert_eq!(explanation.decision, Decision::Deny);
    let matched: Vec<(&str, &str, u32)> = explanation
        .matched
        .iter()
        .map(|m| (m.rule.subject.as_str(), m.rule.effect.as_str(), m.distance))
        .collect();
    assert!(matched.contains(&("tech_manager", "deny", 0)));
    assert!(matched.contains(&("tech_admin", "allow", 1)));

    assert_eq!(
        decide(&evaluator, "tech_manager", TECH_PORTAL, "admin_users", "create").await,
        Decision::Allow
    );
}

#[tokio::test]
async fn lower_tech_roles_inherit_from_higher_ones() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "tech_manager", TECH_PORTAL, "system_config", "manage").await,
        Decision::Allow
    );
    assert_eq!(
        decide(&evaluator, "tech_support", TECH_PORTAL, "licenses", "view").await,
        Decision::Allow
    );
    // Explicit denies lower in the chain still hold.
    assert_eq!(
        decide(&evaluator, "tech_developer", TECH_PORTAL, "admin_users", "create").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "tech_support", TECH_PORTAL, "tech_users", "create").await,
        Decision::Deny
    );
    // Grants never flow up the chain.
    assert_eq!(
        decide(&evaluator, "tech_admin", TECH_PORTAL, "system_logs", "view").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn subordinate_denies_do_not_reach_tech_admin() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    for action in ["create", "update", "delete"] {
        assert_eq!(
            decide(&evaluator, "tech_admin", TECH_PORTAL, "admin_users", action).await,
            Decision::Allow,
            "admin_users:{action}"
        );
    }
    assert_eq!(
        decide(&evaluator, "tech_admin", TECH_PORTAL, "system_config", "manage").await,
        Decision::Allow
    );

    let explanation = evaluator
        .explain("tech_admin", TECH_PORTAL, "admin_users", "create")
        .await;
    assert!(explanation.matched.iter().all(|m| {
        !matches!(
            m.rule.subject.as_str(),
            "tech_manager" | "tech_developer" | "tech_support"
        )
    }));
}

#[tokio::test]
async fn customer_user_is_read_only() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "customer_user", CUSTOMER_PORTAL, "vessels", "delete").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "customer_user", CUSTOMER_PORTAL, "vessels", "view").await,
        Decision::Allow
    );
}

#[tokio::test]
async fn tech_admin_acts_in_admin_portal() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "tech_admin", ADMIN_PORTAL, "customer_orgs", "manage").await,
        Decision::Allow
    );
    // Two portal hops down.
    assert_eq!(
        decide(&evaluator, "tech_admin", CUSTOMER_PORTAL, "rfq", "manage").await,
        Decision::Allow
    );
    assert_eq!(
        decide(&evaluator, "admin_superuser", VENDOR_PORTAL, "inventory", "manage").await,
        Decision::Allow
    );
}

#[tokio::test]
async fn portal_inheritance_only_flows_downward() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "customer_admin", ADMIN_PORTAL, "customer_orgs", "manage").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "admin_superuser", TECH_PORTAL, "system_config", "manage").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "vendor_admin", CUSTOMER_PORTAL, "rfq", "view").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn tech_admin_has_full_license_control() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "tech_admin", TECH_PORTAL, "licenses", "full_control").await,
        Decision::Allow
    );
    // Through admin_superuser in the admin portal.
    assert_eq!(
        decide(&evaluator, "tech_admin", TECH_PORTAL, "licenses", "issue").await,
        Decision::Allow
    );
}

#[tokio::test]
async fn vendor_user_views_but_cannot_manage_catalogue() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "vendor_user", VENDOR_PORTAL, "catalogue", "view").await,
        Decision::Allow
    );
    assert_eq!(
        decide(&evaluator, "vendor_user", VENDOR_PORTAL, "catalogue", "manage").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn portal_deny_overrides_explicit_allow_by_default() {
    // tech_admin's own allow competes with admin_superuser's deny, reached
    // through the portal hierarchy.
    let deny_override = seeded_evaluator(EffectPolicy::DenyOverride).await;
    let explanation = deny_override
        .explain("tech_admin", TECH_PORTAL, "tech_users", "create")
        .await;
    assert_eq!(explanation.decision, Decision::Deny);
    assert!(explanation
        .matched
        .iter()
        .any(|m| m.distance == 0 && m.rule.subject.as_str() == "tech_admin"));
    assert!(explanation
        .matched
        .iter()
        .any(|m| m.distance == 1 && m.rule.subject.as_str() == "admin_superuser"));

    let nearest = seeded_evaluator(EffectPolicy::NearestWins).await;
    assert_eq!(
        decide(&nearest, "tech_admin", TECH_PORTAL, "tech_users", "create").await,
        Decision::Allow
    );
    assert_eq!(
        decide(&nearest, "tech_manager", TECH_PORTAL, "tech_users", "create").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn unknown_roles_and_domains_are_denied() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;
    assert_eq!(
        decide(&evaluator, "intruder", TECH_PORTAL, "licenses", "view").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "tech_admin", "partner_portal", "licenses", "view").await,
        Decision::Deny
    );
    assert_eq!(
        decide(&evaluator, "", TECH_PORTAL, "licenses", "view").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn reverse_tech_edge_is_rejected_after_seeding() {
    let store = seeded_store().await;
    let before = store.snapshot().await.expect("snapshot");

    let err = store
        .add_grouping_policy(
            // `tech_support → tech_admin`, parent first like the seeded chain.
            GroupingRule::try_new("tech_admin", "tech_support", TECH_PORTAL).expect("edge"),
        )
        .await
        .expect_err("cycle");
    match err {
        StoreError::CyclicHierarchy {
            child,
            parent,
            domain,
        } => {
            assert_eq!(child, "tech_admin");
            assert_eq!(parent, "tech_support");
            assert_eq!(domain, TECH_PORTAL);
        }
        other => panic!("unexpected error: {other}"),
    }

    let after = store.snapshot().await.expect("snapshot");
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn reverse_portal_edge_is_rejected_after_seeding() {
    let store = seeded_store().await;
    let err = store
        .add_grouping_policy(GroupingRule::portal(CUSTOMER_PORTAL, TECH_PORTAL).expect("edge"))
        .await
        .expect_err("cycle");
    assert!(matches!(err, StoreError::CyclicHierarchy { .. }));
}

#[tokio::test]
async fn effective_permissions_for_session_setup() {
    let evaluator = seeded_evaluator(EffectPolicy::DenyOverride).await;

    let vendor = evaluator
        .effective_permissions("vendor_user", VENDOR_PORTAL)
        .await;
    assert_eq!(
        vendor,
        vec!["view:catalogue".to_string(), "view:quotation".to_string()]
    );

    let manager = evaluator
        .effective_permissions("tech_manager", TECH_PORTAL)
        .await;
    assert!(manager.contains(&"issue:licenses".to_string()));
    assert!(manager.contains(&"create:admin_users".to_string()));
    // Inherited from tech_admin.
    assert!(manager.contains(&"full_control:licenses".to_string()));
    assert!(manager.contains(&"manage:system_config".to_string()));
    // Portal inheritance into admin_portal.
    assert!(manager.contains(&"manage:customer_orgs".to_string()));
    assert!(!manager.contains(&"create:tech_users".to_string()));
    // tech_developer sits below tech_manager.
    assert!(!manager.contains(&"view:system_logs".to_string()));

    assert!(evaluator
        .effective_permissions("intruder", TECH_PORTAL)
        .await
        .is_empty());
}
