use crate::IdentifierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("grouping {child} -> {parent} in {domain} would create an inheritance cycle")]
    CyclicHierarchy {
        child: String,
        parent: String,
        domain: String,
    },
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn unavailable(context: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(format!("{context}: {err}"))
    }
}

/// Result of an idempotent add: re-adding an identical tuple is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Duplicate,
}

impl AddOutcome {
    pub fn is_inserted(self) -> bool {
        self == AddOutcome::Inserted
    }
}
