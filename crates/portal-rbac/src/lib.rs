//! Role-based access control for the ERP portals.
//!
//! # Purpose
//! Stores allow/deny rules and role/portal inheritance edges, resolves a role's
//! effective rules through both hierarchies, and answers authorization queries
//! for the tech, admin, customer and vendor portals.
//!
//! # How it fits
//! A host calls [`runtime::bootstrap`] once at startup to build the store and
//! seed the default policy set, then shares the returned [`PolicyEvaluator`]
//! with its route guards. Portals that already enforce through Casbin can
//! compile an equivalent enforcer with [`enforcer::compile_enforcer`].
//!
//! # Key invariants
//! - Default deny: a query no rule matches is denied.
//! - Role and portal hierarchies stay acyclic; a cyclic edge is rejected and
//!   leaves the store unchanged.
//! - Adding an existing rule or edge is a no-op reported as a duplicate.
//! - A store that cannot be read yields `Deny`, never an error to the caller.
//!
//! # Examples
//! ```rust
//! use portal_rbac::{Effect, EffectPolicy, PolicyRule, PolicySnapshot, GroupingRule};
//! use portal_rbac::evaluator::resolve;
//!
//! let mut snapshot = PolicySnapshot::new();
//! snapshot
//!     .insert_grouping(GroupingRule::try_new("lead", "member", "ops_portal").unwrap())
//!     .unwrap();
//! snapshot
//!     .insert_rule(PolicyRule::for_role("member", "board", "view", Effect::Allow, "ops_portal").unwrap())
//!     .unwrap();
//!
//! let matched = snapshot.matching_rules("lead", "ops_portal", "board", "view");
//! assert!(resolve(EffectPolicy::DenyOverride, &matched).is_allowed());
//! ```
//!
//! # Common pitfalls
//! - Under deny-override a deny on an inherited role also binds every role
//!   that inherits it; use [`EffectPolicy::NearestWins`] if explicit grants on
//!   the requesting role must win.
//! - A grouping edge reads `(child, parent)`: the child inherits the parent.
//!   In the seeded tech chain that makes `tech_manager` the child of
//!   `tech_admin`.
//! - A compiled Casbin enforcer is a copy; rebuild it after store writes.

mod effect;
mod errors;
mod types;

pub mod config;
pub mod enforcer;
pub mod evaluator;
pub mod observability;
pub mod policy;
pub mod runtime;
pub mod seeder;
pub mod snapshot;
pub mod store;

pub use effect::{Decision, Effect, EffectPolicy};
pub use enforcer::{casbin_model_string, compile_enforcer};
pub use errors::{AddOutcome, StoreError, StoreResult};
pub use evaluator::{Evaluation, PolicyEvaluator};
pub use policy::{GroupingRule, PORTAL_HIERARCHY, PolicyRule};
pub use seeder::{SeedReport, seed_default_policies, seed_policies};
pub use snapshot::{ClosureNode, MatchedRule, PolicyDocument, PolicySnapshot};
pub use store::PolicyStore;
pub use types::{ActionId, DomainId, IdentifierError, ObjectId, RoleId, WILDCARD};
