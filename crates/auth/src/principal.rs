use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use raxerp_core::{PermissionId, PrincipalId, RoleId};

use crate::{Permission, Role};

/// Stored credential row for a principal, as returned by a
/// [`crate::CredentialStore`] lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: PrincipalId,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
}

impl core::fmt::Debug for PrincipalRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrincipalRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Roles held by a principal and the union of their permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants {
    pub roles: BTreeSet<Role>,
    pub permissions: BTreeSet<Permission>,
}

/// A fully resolved, authenticated principal.
///
/// Built by the [`crate::Authenticator`] from a credential row plus one batch
/// resolution of the role/permission graph. Handed to request handlers as an
/// opaque context value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    pub fn from_parts(record: PrincipalRecord, grants: Grants) -> Self {
        Self {
            id: record.id,
            email: record.email,
            enabled: record.enabled,
            roles: grants.roles,
            permissions: grants.permissions,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }

    pub fn role_names(&self) -> Vec<Role> {
        self.roles.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: PrincipalId,
    pub email: String,
    pub enabled: bool,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub id: PermissionId,
    pub name: Permission,
}
