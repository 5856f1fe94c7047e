//! `raxerp-auth`: authentication and role/permission authorization core.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence is
//! reached through the contracts in [`store`], transport through [`gate`].

pub mod authenticator;
pub mod authorize;
pub mod claims;
pub mod error;
pub mod gate;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod service;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use authenticator::Authenticator;
pub use authorize::{Decision, DenyReason, GrantBasis, Requirement, decide};
pub use claims::{SessionClaims, TokenError, validate_claims};
pub use error::AuthError;
pub use gate::{ACCESS_TOKEN_COOKIE, Rejection, RequestGate, TokenSource};
pub use password::{Argon2PasswordHasher, PasswordHasher, hash_blocking, verify_blocking};
pub use permissions::Permission;
pub use principal::{
    Grants, PermissionSummary, Principal, PrincipalRecord, PrincipalSummary, RoleSummary,
};
pub use roles::Role;
pub use service::AuthService;
pub use store::{AuthStore, CredentialStore, InMemoryAuthStore, PrincipalDirectory, RoleGraph};
pub use token::{IssuedToken, MAX_LEEWAY_SECONDS, MAX_TOKEN_TTL_SECONDS, TokenService, check_ttl};
