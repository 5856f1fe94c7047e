//! Session token issuance and validation (HS256 JWT).

use std::collections::HashSet;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use raxerp_core::PrincipalId;

use crate::claims::{SessionClaims, validate_claims};
use crate::{AuthError, Role};

/// Longest accepted session lifetime (one year).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Largest accepted clock-skew allowance past expiry (one hour).
pub const MAX_LEEWAY_SECONDS: i64 = 60 * 60;

/// A freshly minted session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub claims: SessionClaims,
}

impl IssuedToken {
    /// Lifetime of the token in whole seconds (cookie `Max-Age`).
    pub fn ttl_seconds(&self) -> i64 {
        (self.claims.expires_at - self.claims.issued_at).num_seconds()
    }
}

/// Issues and validates signed, time-bound session tokens.
///
/// Pure function of its inputs, the wall clock and the signing secret: nothing
/// is stored server-side.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    leeway: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service with an exact expiry boundary (no clock skew).
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        Self::with_leeway(secret, Duration::zero())
    }

    /// Create a token service tolerating `leeway` of clock skew past expiry.
    pub fn with_leeway(secret: &[u8], leeway: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::validation("token signing secret cannot be empty"));
        }
        if leeway < Duration::zero() {
            return Err(AuthError::validation("token leeway cannot be negative"));
        }
        if leeway > Duration::seconds(MAX_LEEWAY_SECONDS) {
            return Err(AuthError::validation(format!(
                "token leeway cannot exceed {MAX_LEEWAY_SECONDS} seconds"
            )));
        }

        // Expiry is checked by `validate_claims` with sub-second precision, so
        // the library's own time checks are disabled.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            leeway,
        })
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn issue(
        &self,
        principal_id: PrincipalId,
        email: &str,
        roles: Vec<Role>,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(principal_id, email, roles, ttl, Utc::now())
    }

    /// Issue a token as of `now`. Both `now` and `ttl` are truncated to whole
    /// seconds, the resolution of the `iat`/`exp` claims.
    pub fn issue_at(
        &self,
        principal_id: PrincipalId,
        email: &str,
        roles: Vec<Role>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        check_ttl(ttl)?;

        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(Duration::seconds(ttl.num_seconds()))
            .ok_or_else(|| AuthError::validation("token expiry is out of range"))?;
        let claims = SessionClaims {
            sub: email.to_string(),
            uid: principal_id,
            roles,
            issued_at,
            expires_at,
        };

        let access_token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
                .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))?;

        Ok(IssuedToken {
            access_token,
            claims,
        })
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Verify signature and structure, then expiry as of `now`.
    ///
    /// Signature failures take precedence over expiry: an expired token with a
    /// bad signature is `TokenInvalid`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                AuthError::TokenInvalid
            })?;

        validate_claims(&data.claims, now, self.leeway)?;
        Ok(data.claims)
    }
}

/// Session lifetimes must lie within `1s..=MAX_TOKEN_TTL_SECONDS`.
pub fn check_ttl(ttl: Duration) -> Result<(), AuthError> {
    if ttl < Duration::seconds(1) {
        return Err(AuthError::validation("token ttl must be at least one second"));
    }
    if ttl > Duration::seconds(MAX_TOKEN_TTL_SECONDS) {
        return Err(AuthError::validation(format!(
            "token ttl cannot exceed {MAX_TOKEN_TTL_SECONDS} seconds"
        )));
    }
    Ok(())
}
