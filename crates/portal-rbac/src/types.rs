//! Strongly typed identifiers for roles, domains, objects and actions.
//!
//! # Purpose
//! Wraps policy strings so a role cannot be passed where a domain is expected,
//! and validates them once at the boundary instead of at every lookup.
//!
//! # How it fits
//! Rules and groupings are built from these types; the store interns them so
//! identical names share one allocation for the lifetime of the process.
//!
//! # Key invariants
//! - Identifiers are non-empty and use `[A-Za-z0-9_.:-]`.
//! - Only objects and actions may be the literal `*` wildcard.
//! - `Display` and `as_str` return the validated value unchanged.
//!
//! # Examples
//! ```rust
//! use portal_rbac::{DomainId, RoleId};
//!
//! let role = RoleId::new("tech_admin").expect("valid role");
//! let domain = DomainId::new("tech_portal").expect("valid domain");
//! assert_eq!(format!("{role}@{domain}"), "tech_admin@tech_portal");
//! ```
//!
//! # Common pitfalls
//! - Roles and domains reject `*`; wildcards are only meaningful on the
//!   object/action axis of a rule.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::sync::Arc;
use thiserror::Error;

/// Wildcard accepted in the object and action positions of a rule.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} `{value}` contains invalid characters")]
    InvalidCharacters { kind: &'static str, value: String },
    #[error("{kind} must not be a wildcard")]
    WildcardNotAllowed { kind: &'static str },
}

fn validate(kind: &'static str, value: &str, allow_wildcard: bool) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value == WILDCARD {
        return if allow_wildcard {
            Ok(())
        } else {
            Err(IdentifierError::WildcardNotAllowed { kind })
        };
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'));
    if !valid {
        return Err(IdentifierError::InvalidCharacters {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal, wildcard = $wildcard:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Arc<str>);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
                let value = value.as_ref();
                validate($kind, value, $wildcard)?;
                Ok(Self(Arc::from(value)))
            }

            pub(crate) fn from_shared(value: Arc<str>) -> Self {
                Self(value)
            }

            pub(crate) fn shared(&self) -> &Arc<str> {
                &self.0
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentifierError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Role name, e.g. `tech_admin` or `customer_user`.
    RoleId,
    "role",
    wildcard = false
);

identifier!(
    /// Portal scope, e.g. `tech_portal`.
    DomainId,
    "domain",
    wildcard = false
);

identifier!(
    /// Protected resource category, e.g. `licenses`. May be `*`.
    ObjectId,
    "object",
    wildcard = true
);

identifier!(
    /// Operation on an object, e.g. `create`. May be `*`.
    ActionId,
    "action",
    wildcard = true
);

impl ObjectId {
    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }

    /// Whether this rule object covers the requested object.
    pub fn matches(&self, requested: &str) -> bool {
        self.is_wildcard() || self.as_str() == requested
    }
}

impl ActionId {
    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }

    /// Whether this rule action covers the requested action.
    pub fn matches(&self, requested: &str) -> bool {
        self.is_wildcard() || self.as_str() == requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_accept_policy_names() {
        assert_eq!(RoleId::new("tech_admin").expect("role").as_str(), "tech_admin");
        assert_eq!(
            DomainId::new("vendor_portal").expect("domain").to_string(),
            "vendor_portal"
        );
        assert!(ObjectId::new("billing:invoices").is_ok());
        assert!(ActionId::new("full_control").is_ok());
    }

    #[test]
    fn identifiers_reject_malformed_values() {
        assert_eq!(
            RoleId::new("").expect_err("empty"),
            IdentifierError::Empty { kind: "role" }
        );
        assert!(matches!(
            RoleId::new("tech admin"),
            Err(IdentifierError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            DomainId::new(" tech_portal"),
            Err(IdentifierError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn wildcards_only_on_object_and_action() {
        assert!(ObjectId::new("*").expect("object").is_wildcard());
        assert!(ActionId::new("*").expect("action").is_wildcard());
        assert_eq!(
            RoleId::new("*").expect_err("role wildcard"),
            IdentifierError::WildcardNotAllowed { kind: "role" }
        );
        assert!(DomainId::new("*").is_err());
    }

    #[test]
    fn wildcard_matching() {
        let any = ObjectId::new("*").expect("object");
        let licenses = ObjectId::new("licenses").expect("object");
        assert!(any.matches("licenses"));
        assert!(licenses.matches("licenses"));
        assert!(!licenses.matches("license"));

        let view = ActionId::new("view").expect("action");
        assert!(view.matches("view"));
        assert!(!view.matches("manage"));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let role: RoleId = serde_json::from_str("\"vendor_user\"").expect("role");
        assert_eq!(role.as_str(), "vendor_user");
        assert!(serde_json::from_str::<RoleId>("\"*\"").is_err());
        assert_eq!(serde_json::to_string(&role).expect("json"), "\"vendor_user\"");
    }
}
