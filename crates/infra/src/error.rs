//! Infrastructure and service error model.

use thiserror::Error;

use courier_core::DomainError;

/// Storage failure, independent of the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// A lock or statement did not finish in time. Safe to retry.
    #[error("storage timeout: {0}")]
    Timeout(String),

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// What application services return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A commission run found no fulfilled orders in the period.
    #[error("nothing to bill: {0}")]
    NothingToBill(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Timeout(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
