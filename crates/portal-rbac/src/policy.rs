//! RBAC policy/grouping models.
//!
//! # Purpose
//! Defines the rule and grouping tuple shapes shared by the stores, the
//! seeder, the evaluator and the Casbin export.
use crate::{ActionId, DomainId, Effect, IdentifierError, ObjectId, RoleId};
use serde::{Deserialize, Serialize};

/// Grouping scope reserved for portal-to-portal inheritance edges.
pub const PORTAL_HIERARCHY: &str = "portal_hierarchy";

/// One authorization rule: `subject` may (or may not) perform `action` on
/// `object` within `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: RoleId,
    pub object: ObjectId,
    pub action: ActionId,
    pub effect: Effect,
    pub domain: DomainId,
    pub acting_role: RoleId,
}

impl PolicyRule {
    /// Build a rule from raw strings in `addPolicy` argument order.
    pub fn try_new(
        subject: &str,
        object: &str,
        action: &str,
        effect: Effect,
        domain: &str,
        acting_role: &str,
    ) -> Result<Self, IdentifierError> {
        Ok(Self {
            subject: RoleId::new(subject)?,
            object: ObjectId::new(object)?,
            action: ActionId::new(action)?,
            effect,
            domain: DomainId::new(domain)?,
            acting_role: RoleId::new(acting_role)?,
        })
    }

    /// Shorthand for rules whose acting role is the subject itself.
    pub fn for_role(
        subject: &str,
        object: &str,
        action: &str,
        effect: Effect,
        domain: &str,
    ) -> Result<Self, IdentifierError> {
        Self::try_new(subject, object, action, effect, domain, subject)
    }

    /// `action:object` rendering used in flattened permission lists.
    pub fn permission_string(&self) -> String {
        format!("{}:{}", self.action, self.object)
    }
}

/// Directed inheritance edge: `child` inherits every grant of `parent`.
///
/// Role edges live in a portal domain. Portal edges use the reserved
/// [`PORTAL_HIERARCHY`] scope and name domains on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingRule {
    pub child: RoleId,
    pub parent: RoleId,
    pub domain: DomainId,
}

impl GroupingRule {
    pub fn try_new(child: &str, parent: &str, domain: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            child: RoleId::new(child)?,
            parent: RoleId::new(parent)?,
            domain: DomainId::new(domain)?,
        })
    }

    /// Portal inheritance edge: roles of `upper` may act as roles of `lower`.
    pub fn portal(upper: &str, lower: &str) -> Result<Self, IdentifierError> {
        Self::try_new(upper, lower, PORTAL_HIERARCHY)
    }

    pub fn is_portal_edge(&self) -> bool {
        self.domain.as_str() == PORTAL_HIERARCHY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_constructors_validate_every_field() {
        let rule = PolicyRule::for_role(
            "tech_admin",
            "licenses",
            "full_control",
            Effect::Allow,
            "tech_portal",
        )
        .expect("rule");
        assert_eq!(rule.acting_role, rule.subject);
        assert_eq!(rule.permission_string(), "full_control:licenses");

        assert!(PolicyRule::for_role("", "licenses", "view", Effect::Allow, "tech_portal").is_err());
        assert!(PolicyRule::for_role("tech_admin", "licenses", "view", Effect::Allow, "*").is_err());
    }

    #[test]
    fn portal_edges_use_reserved_scope() {
        let edge = GroupingRule::portal("tech_portal", "admin_portal").expect("edge");
        assert!(edge.is_portal_edge());
        assert_eq!(edge.domain.as_str(), PORTAL_HIERARCHY);

        let role_edge =
            GroupingRule::try_new("tech_admin", "tech_manager", "tech_portal").expect("edge");
        assert!(!role_edge.is_portal_edge());
    }

    #[test]
    fn rule_serde_shape() {
        let rule = PolicyRule::for_role("vendor_user", "catalogue", "view", Effect::Allow, "vendor_portal")
            .expect("rule");
        let json = serde_json::to_value(&rule).expect("json");
        assert_eq!(json["effect"], "allow");
        assert_eq!(json["acting_role"], "vendor_user");
        let back: PolicyRule = serde_json::from_value(json).expect("decode");
        assert_eq!(back, rule);
    }
}
