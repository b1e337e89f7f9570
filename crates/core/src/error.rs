//! Domain error model.

use thiserror::Error;

/// Result type used across the RBAC domain.
pub type DomainResult<T> = Result<T, DomainError>;

/// Broad category of a [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A caller-supplied value is malformed or a required reference is missing.
    Argument,
    /// An identity, name or id collides with one already present.
    Duplicate,
    /// The call is well-formed but would break a cross-entity invariant.
    State,
    /// An explicitly requested entity does not exist.
    NotFound,
}

/// Domain-level error.
///
/// Every mutating operation that returns one of these has left the stores it
/// touched exactly as they were before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation or a required reference was absent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A uniqueness constraint rejected the value.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A cross-entity invariant rejected the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidArgument(_) => ErrorKind::Argument,
            DomainError::Duplicate(_) => ErrorKind::Duplicate,
            DomainError::InvalidState(_) => ErrorKind::State,
            DomainError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Require a non-blank string, returning it trimmed.
///
/// `field` names the value in the error message.
pub fn require_non_blank(value: &str, field: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_argument(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}
