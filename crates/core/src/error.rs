//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Storage and
/// transport failures (timeouts, connection loss) belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input, rejected before any persistence.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (duplicate report period, lost lock race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor lacks the role or the ownership/region scope.
    ///
    /// Deliberately indistinguishable from "not found" to callers.
    #[error("not found or forbidden")]
    Unauthorized,

    /// The aggregate is not in the state the operation requires.
    #[error("precondition failed: {message} (current status: {current})")]
    Precondition { current: String, message: String },

    /// Server-side configuration fault (missing policy row, unset rate).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn precondition(current: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Precondition {
            current: current.into(),
            message: msg.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
