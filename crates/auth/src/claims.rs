use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use courier_core::{RegionId, UserId};

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// Token issuance happens elsewhere; this is the minimal set of claims the
/// marketplace core expects once a token has been decoded and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// The user's marketplace role.
    pub role: Role,

    /// Service regions managed by a branch manager (empty for other roles).
    #[serde(default)]
    pub managed_regions: Vec<RegionId>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("managed_regions is only valid for branch managers")]
    UnexpectedRegions,
}

/// Deterministically validate JWT claims.
///
/// This validates the *claims* only; signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    if claims.role != Role::BranchManager && !claims.managed_regions.is_empty() {
        return Err(TokenValidationError::UnexpectedRegions);
    }
    Ok(())
}
