//! Immutable policy set with inheritance closure and cycle checks.
//!
//! # Purpose and responsibility
//! Holds the deduplicated rules and grouping edges of a store, indexes them by
//! `(role, domain)` node, and answers closure queries for the evaluator.
//!
//! # Key invariants and assumptions
//! - Rules and groupings are unique by full tuple; re-inserts are no-ops.
//! - Role edges form a DAG within each domain and portal edges form a DAG over
//!   domains. Inserts that would break either are rejected before mutation.
//! - Closure traversal is breadth-first, so every node carries its shortest
//!   hierarchy distance from the requesting role.
//!
//! # Security considerations
//! - A role only descends into lower portals from a domain it is declared in;
//!   unknown roles reach nothing and therefore match no rule.
use crate::policy::{GroupingRule, PORTAL_HIERARCHY, PolicyRule};
use crate::{ActionId, AddOutcome, DomainId, ObjectId, RoleId, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Serializable form of a policy set, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
    #[serde(default)]
    pub groupings: Vec<GroupingRule>,
}

/// A `(role, domain)` node reached while resolving inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureNode {
    pub role: RoleId,
    pub domain: DomainId,
    /// Number of inheritance edges between the requesting role and this node.
    pub distance: u32,
}

/// A rule that matched a query, with the distance it was inherited over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRule {
    pub rule: PolicyRule,
    pub distance: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    rules: Vec<PolicyRule>,
    rule_index: HashSet<PolicyRule>,
    groupings: Vec<GroupingRule>,
    grouping_index: HashSet<GroupingRule>,
    /// domain -> child role -> parent roles
    role_parents: HashMap<DomainId, HashMap<RoleId, Vec<RoleId>>>,
    /// upper portal -> lower portals
    lower_portals: HashMap<DomainId, Vec<DomainId>>,
    /// lower portal -> upper portals
    upper_portals: HashMap<DomainId, Vec<DomainId>>,
    /// domain -> roles that are rule subjects or role-edge endpoints there
    declared: HashMap<DomainId, BTreeSet<RoleId>>,
    /// domain -> subject role -> positions in `rules`
    rules_by_node: HashMap<DomainId, HashMap<RoleId, Vec<usize>>>,
    interned: HashSet<Arc<str>>,
}

impl PolicySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a snapshot by replaying a document through the insert checks.
    pub fn from_document(document: PolicyDocument) -> StoreResult<Self> {
        let mut snapshot = Self::new();
        for grouping in document.groupings {
            snapshot.insert_grouping(grouping)?;
        }
        for rule in document.policies {
            snapshot.insert_rule(rule)?;
        }
        Ok(snapshot)
    }

    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument {
            policies: self.rules.clone(),
            groupings: self.groupings.clone(),
        }
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn groupings(&self) -> &[GroupingRule] {
        &self.groupings
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn grouping_count(&self) -> usize {
        self.groupings.len()
    }

    pub fn contains_rule(&self, rule: &PolicyRule) -> bool {
        self.rule_index.contains(rule)
    }

    pub fn contains_grouping(&self, grouping: &GroupingRule) -> bool {
        self.grouping_index.contains(grouping)
    }

    /// Domains that carry declared roles, in sorted order.
    pub fn domains(&self) -> Vec<DomainId> {
        let mut domains: Vec<DomainId> = self.declared.keys().cloned().collect();
        domains.sort();
        domains
    }

    pub fn declared_roles(&self, domain: &str) -> impl Iterator<Item = &RoleId> {
        self.declared.get(domain).into_iter().flatten()
    }

    pub fn is_declared(&self, role: &str, domain: &str) -> bool {
        self.declared
            .get(domain)
            .is_some_and(|roles| roles.contains(role))
    }

    /// Insert a rule, deduplicating on the full tuple.
    pub fn insert_rule(&mut self, rule: PolicyRule) -> StoreResult<AddOutcome> {
        if rule.domain.as_str() == PORTAL_HIERARCHY {
            return Err(StoreError::InvalidRule(format!(
                "rules cannot be scoped to the reserved `{PORTAL_HIERARCHY}` domain"
            )));
        }
        if self.rule_index.contains(&rule) {
            return Ok(AddOutcome::Duplicate);
        }

        let rule = PolicyRule {
            subject: self.intern_role(&rule.subject),
            object: ObjectId::from_shared(self.intern(rule.object.shared())),
            action: ActionId::from_shared(self.intern(rule.action.shared())),
            effect: rule.effect,
            domain: self.intern_domain(&rule.domain),
            acting_role: self.intern_role(&rule.acting_role),
        };

        let position = self.rules.len();
        self.declare(&rule.subject, &rule.domain);
        self.rules_by_node
            .entry(rule.domain.clone())
            .or_default()
            .entry(rule.subject.clone())
            .or_default()
            .push(position);
        self.rule_index.insert(rule.clone());
        self.rules.push(rule);
        Ok(AddOutcome::Inserted)
    }

    /// Insert a grouping edge, rejecting edges that would close a cycle.
    pub fn insert_grouping(&mut self, grouping: GroupingRule) -> StoreResult<AddOutcome> {
        if self.grouping_index.contains(&grouping) {
            return Ok(AddOutcome::Duplicate);
        }
        self.check_acyclic(&grouping)?;

        let grouping = GroupingRule {
            child: self.intern_role(&grouping.child),
            parent: self.intern_role(&grouping.parent),
            domain: self.intern_domain(&grouping.domain),
        };

        if grouping.is_portal_edge() {
            let upper = DomainId::from_shared(grouping.child.shared().clone());
            let lower = DomainId::from_shared(grouping.parent.shared().clone());
            self.lower_portals
                .entry(upper.clone())
                .or_default()
                .push(lower.clone());
            self.upper_portals.entry(lower).or_default().push(upper);
        } else {
            self.declare(&grouping.child, &grouping.domain);
            self.declare(&grouping.parent, &grouping.domain);
            self.role_parents
                .entry(grouping.domain.clone())
                .or_default()
                .entry(grouping.child.clone())
                .or_default()
                .push(grouping.parent.clone());
        }
        self.grouping_index.insert(grouping.clone());
        self.groupings.push(grouping);
        Ok(AddOutcome::Inserted)
    }

    fn check_acyclic(&self, grouping: &GroupingRule) -> StoreResult<()> {
        let child = grouping.child.as_str();
        let parent = grouping.parent.as_str();
        // The new edge closes a cycle iff the parent already reaches the child.
        let cyclic = if child == parent {
            true
        } else if grouping.is_portal_edge() {
            reaches(parent, child, |node| {
                self.lower_portals
                    .get(node)
                    .into_iter()
                    .flatten()
                    .map(|domain| domain.as_str())
                    .collect()
            })
        } else {
            let edges = self.role_parents.get(grouping.domain.as_str());
            reaches(parent, child, |node| {
                edges
                    .and_then(|edges| edges.get(node))
                    .into_iter()
                    .flatten()
                    .map(|role| role.as_str())
                    .collect()
            })
        };
        if cyclic {
            return Err(StoreError::CyclicHierarchy {
                child: child.to_string(),
                parent: parent.to_string(),
                domain: grouping.domain.to_string(),
            });
        }
        Ok(())
    }

    /// Portals strictly above `domain`, nearest first.
    pub fn ancestor_portals(&self, domain: &str) -> Vec<DomainId> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([domain]);
        while let Some(current) = queue.pop_front() {
            for upper in self.upper_portals.get(current).into_iter().flatten() {
                if seen.insert(upper.as_str()) {
                    ordered.push(upper.clone());
                    queue.push_back(upper.as_str());
                }
            }
        }
        ordered
    }

    /// Every `(role, domain)` node the requester may act as, with distances.
    pub fn closure(&self, role: &str, domain: &str) -> Vec<ClosureNode> {
        let (Ok(role), Ok(domain)) = (RoleId::new(role), DomainId::new(domain)) else {
            return Vec::new();
        };

        let mut queue: VecDeque<(RoleId, DomainId, u32)> = VecDeque::new();
        queue.push_back((role.clone(), domain.clone(), 0));

        // A role declared in a higher portal may act as any role of this one.
        let anchored_above = self
            .ancestor_portals(domain.as_str())
            .iter()
            .any(|upper| self.is_declared(role.as_str(), upper.as_str()));
        if anchored_above {
            for lower_role in self.declared_roles(domain.as_str()) {
                queue.push_back((lower_role.clone(), domain.clone(), 1));
            }
        }

        let mut visited: HashSet<(RoleId, DomainId)> = HashSet::new();
        let mut nodes = Vec::new();
        while let Some((role, domain, distance)) = queue.pop_front() {
            if !visited.insert((role.clone(), domain.clone())) {
                continue;
            }

            let parents = self
                .role_parents
                .get(domain.as_str())
                .and_then(|edges| edges.get(role.as_str()));
            for parent in parents.into_iter().flatten() {
                queue.push_back((parent.clone(), domain.clone(), distance + 1));
            }

            if self.is_declared(role.as_str(), domain.as_str()) {
                for lower in self.lower_portals.get(domain.as_str()).into_iter().flatten() {
                    for lower_role in self.declared_roles(lower.as_str()) {
                        queue.push_back((lower_role.clone(), lower.clone(), distance + 1));
                    }
                }
            }

            nodes.push(ClosureNode {
                role,
                domain,
                distance,
            });
        }
        nodes
    }

    /// Rules attached to the requester's closure, nearest first.
    pub fn rules_for(&self, role: &str, domain: &str) -> Vec<MatchedRule> {
        let mut matched = Vec::new();
        for node in self.closure(role, domain) {
            let positions = self
                .rules_by_node
                .get(node.domain.as_str())
                .and_then(|by_role| by_role.get(node.role.as_str()));
            for &position in positions.into_iter().flatten() {
                matched.push(MatchedRule {
                    rule: self.rules[position].clone(),
                    distance: node.distance,
                });
            }
        }
        matched
    }

    /// Closure rules whose object and action cover the query.
    pub fn matching_rules(
        &self,
        role: &str,
        domain: &str,
        object: &str,
        action: &str,
    ) -> Vec<MatchedRule> {
        self.rules_for(role, domain)
            .into_iter()
            .filter(|matched| {
                matched.rule.object.matches(object) && matched.rule.action.matches(action)
            })
            .collect()
    }

    fn declare(&mut self, role: &RoleId, domain: &DomainId) {
        self.declared
            .entry(domain.clone())
            .or_default()
            .insert(role.clone());
    }

    fn intern(&mut self, value: &Arc<str>) -> Arc<str> {
        if let Some(existing) = self.interned.get(value.as_ref()) {
            return existing.clone();
        }
        self.interned.insert(value.clone());
        value.clone()
    }

    fn intern_role(&mut self, role: &RoleId) -> RoleId {
        RoleId::from_shared(self.intern(role.shared()))
    }

    fn intern_domain(&mut self, domain: &DomainId) -> DomainId {
        DomainId::from_shared(self.intern(domain.shared()))
    }
}

fn reaches<'a>(from: &'a str, target: &str, next: impl Fn(&'a str) -> Vec<&'a str>) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if seen.insert(node) {
            stack.extend(next(node));
        }
    }
    false
}
