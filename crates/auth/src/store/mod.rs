//! Storage contracts consumed by the authorization core.
//!
//! The relational store is an external collaborator: these traits are the
//! only way the core reaches it. Implementations live in `raxerp-infra`
//! (Postgres) and [`in_memory`] (dev/test).

use std::collections::BTreeSet;

use async_trait::async_trait;

use raxerp_core::{Email, PrincipalId};

use crate::{
    AuthError, Grants, Permission, PermissionSummary, PrincipalRecord, PrincipalSummary, Role,
    RoleSummary,
};

pub mod in_memory;

pub use in_memory::InMemoryAuthStore;

/// Lookup of principal credentials by identifier.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact (case-sensitive) email match.
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, AuthError>;

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, AuthError>;
}

/// Principal↔Role and Role↔Permission associations.
///
/// Create operations fail with `DuplicateName` when the name exists; any
/// reference to an unknown principal, role or permission fails with
/// `NotFound`. Deleting an endpoint removes its assignment edges in the same
/// transaction.
#[async_trait]
pub trait RoleGraph: Send + Sync {
    async fn roles_of(&self, principal: PrincipalId) -> Result<BTreeSet<Role>, AuthError>;

    async fn permissions_of(&self, role: &Role) -> Result<BTreeSet<Permission>, AuthError>;

    /// Roles of `principal` plus the union of their permissions, read from a
    /// single consistent snapshot in one round trip.
    async fn resolve_grants(&self, principal: PrincipalId) -> Result<Grants, AuthError>;

    async fn create_permission(&self, name: &Permission) -> Result<PermissionSummary, AuthError>;

    async fn create_role(
        &self,
        name: &Role,
        permissions: &[Permission],
    ) -> Result<RoleSummary, AuthError>;

    async fn delete_role(&self, name: &Role) -> Result<(), AuthError>;

    /// Idempotent: assigning a role the principal already holds is a no-op.
    async fn assign_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError>;

    /// Idempotent: revoking a role the principal does not hold is a no-op.
    async fn revoke_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError>;

    async fn list_roles(&self) -> Result<Vec<RoleSummary>, AuthError>;

    async fn list_permissions(&self) -> Result<Vec<PermissionSummary>, AuthError>;
}

/// Administrative lifecycle of principals.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Create a principal holding `roles`. Fails with `DuplicateName` on an
    /// existing email and `NotFound` on an unknown role; nothing is written in
    /// either case.
    async fn create_principal(
        &self,
        email: &Email,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<PrincipalSummary, AuthError>;

    /// Hard delete; role assignments are removed with the principal.
    async fn delete_principal(&self, id: PrincipalId) -> Result<(), AuthError>;

    async fn set_enabled(&self, id: PrincipalId, enabled: bool) -> Result<(), AuthError>;
}

/// Everything the core needs from the backing store.
pub trait AuthStore: CredentialStore + RoleGraph + PrincipalDirectory {}

impl<T> AuthStore for T where T: CredentialStore + RoleGraph + PrincipalDirectory + ?Sized {}

