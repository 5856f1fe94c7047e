use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use raxerp_core::PrincipalId;

use crate::Role;

/// Session token claim set.
///
/// `sub` is the principal's email, `uid` its numeric id, `roles` a snapshot
/// of role names taken at login. The snapshot is informational: authorization
/// re-resolves roles from storage on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,

    pub uid: PrincipalId,

    pub roles: Vec<Role>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims.
///
/// The token is valid iff `now < expires_at + leeway`. A deadline past the
/// representable range never passes. This checks the *claims* only;
/// signature verification happens in [`crate::TokenService`].
pub fn validate_claims(
    claims: &SessionClaims,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::InvalidTimeWindow);
    }
    match claims.expires_at.checked_add_signed(leeway) {
        Some(deadline) if now >= deadline => Err(TokenError::Expired),
        _ => Ok(()),
    }
}
