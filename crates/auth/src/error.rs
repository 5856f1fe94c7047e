use thiserror::Error;

use raxerp_core::DomainError;

use crate::claims::TokenError;

/// Error taxonomy of the authorization core.
///
/// Authentication failures (`NotFound`, `BadCredential`, `AccountDisabled`,
/// `TokenInvalid`, `TokenExpired`) and authorization failures (`MissingRole`,
/// `MissingPermission`) are terminal for a request. `Storage` and `Internal`
/// are server faults and must never be reported as "forbidden".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("not found")]
    NotFound,

    #[error("bad credential")]
    BadCredential,

    #[error("account disabled")]
    AccountDisabled,

    #[error("token invalid")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("missing role")]
    MissingRole,

    #[error("missing permission")]
    MissingPermission,

    #[error("name already exists: '{0}'")]
    DuplicateName(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Failures that collapse to a generic 401-equivalent outcome.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::BadCredential
                | Self::AccountDisabled
                | Self::TokenInvalid
                | Self::TokenExpired
        )
    }

    /// Failures that collapse to a generic 403-equivalent outcome.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::MissingRole | Self::MissingPermission)
    }

    /// Failures caused by the server side (storage outage, signing failure).
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => Self::TokenExpired,
            TokenError::InvalidTimeWindow => Self::TokenInvalid,
        }
    }
}
