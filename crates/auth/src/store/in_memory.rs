use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use raxerp_core::{Email, PermissionId, PrincipalId, RoleId};

use super::{CredentialStore, PrincipalDirectory, RoleGraph};
use crate::{
    AuthError, Grants, Permission, PermissionSummary, PrincipalRecord, PrincipalSummary, Role,
    RoleSummary,
};

#[derive(Debug, Default)]
struct Graph {
    next_id: i64,
    principals: BTreeMap<PrincipalId, PrincipalRecord>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    user_roles: BTreeSet<(PrincipalId, RoleId)>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
}

impl Graph {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn role_id(&self, name: &Role) -> Option<RoleId> {
        self.roles
            .iter()
            .find_map(|(id, role)| (role == name).then_some(*id))
    }

    fn permission_id(&self, name: &Permission) -> Option<PermissionId> {
        self.permissions
            .iter()
            .find_map(|(id, perm)| (perm == name).then_some(*id))
    }

    fn role_ids_of(&self, principal: PrincipalId) -> impl Iterator<Item = RoleId> + '_ {
        self.user_roles
            .range((principal, RoleId::new(i64::MIN))..=(principal, RoleId::new(i64::MAX)))
            .map(|(_, role_id)| *role_id)
    }

    fn permissions_of_role(&self, role_id: RoleId) -> impl Iterator<Item = &Permission> + '_ {
        self.role_permissions
            .range((role_id, PermissionId::new(i64::MIN))..=(role_id, PermissionId::new(i64::MAX)))
            .filter_map(|(_, perm_id)| self.permissions.get(perm_id))
    }

    fn role_summary(&self, id: RoleId, name: &Role) -> RoleSummary {
        RoleSummary {
            id,
            name: name.clone(),
            permissions: self.permissions_of_role(id).cloned().collect(),
        }
    }

    fn principal_summary(&self, record: &PrincipalRecord) -> PrincipalSummary {
        PrincipalSummary {
            id: record.id,
            email: record.email.clone(),
            enabled: record.enabled,
            roles: self
                .role_ids_of(record.id)
                .filter_map(|id| self.roles.get(&id).cloned())
                .collect(),
        }
    }
}

/// In-memory auth store for tests/dev.
///
/// The whole graph sits behind one `RwLock`, so every read observes a single
/// consistent snapshot and every mutation is atomic. Not shared across
/// processes.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    inner: RwLock<Graph>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Graph>, AuthError> {
        self.inner
            .read()
            .map_err(|_| AuthError::storage("in-memory auth store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Graph>, AuthError> {
        self.inner
            .write()
            .map_err(|_| AuthError::storage("in-memory auth store lock poisoned"))
    }
}

#[async_trait]
impl CredentialStore for InMemoryAuthStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, AuthError> {
        let graph = self.read()?;
        Ok(graph.principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, AuthError> {
        Ok(self.read()?.principals.get(&id).cloned())
    }
}

#[async_trait]
impl RoleGraph for InMemoryAuthStore {
    async fn roles_of(&self, principal: PrincipalId) -> Result<BTreeSet<Role>, AuthError> {
        let graph = self.read()?;
        Ok(graph
            .role_ids_of(principal)
            .filter_map(|id| graph.roles.get(&id).cloned())
            .collect())
    }

    async fn permissions_of(&self, role: &Role) -> Result<BTreeSet<Permission>, AuthError> {
        let graph = self.read()?;
        let role_id = graph.role_id(role).ok_or(AuthError::NotFound)?;
        Ok(graph.permissions_of_role(role_id).cloned().collect())
    }

    async fn resolve_grants(&self, principal: PrincipalId) -> Result<Grants, AuthError> {
        let graph = self.read()?;
        let mut grants = Grants::default();
        for role_id in graph.role_ids_of(principal) {
            if let Some(role) = graph.roles.get(&role_id) {
                grants.roles.insert(role.clone());
            }
            grants
                .permissions
                .extend(graph.permissions_of_role(role_id).cloned());
        }
        Ok(grants)
    }

    async fn create_permission(&self, name: &Permission) -> Result<PermissionSummary, AuthError> {
        let mut graph = self.write()?;
        if graph.permission_id(name).is_some() {
            return Err(AuthError::DuplicateName(name.to_string()));
        }

        let id = PermissionId::new(graph.next_id());
        graph.permissions.insert(id, name.clone());
        Ok(PermissionSummary {
            id,
            name: name.clone(),
        })
    }

    async fn create_role(
        &self,
        name: &Role,
        permissions: &[Permission],
    ) -> Result<RoleSummary, AuthError> {
        let mut graph = self.write()?;
        if graph.role_id(name).is_some() {
            return Err(AuthError::DuplicateName(name.to_string()));
        }

        let perm_ids = permissions
            .iter()
            .map(|p| graph.permission_id(p).ok_or(AuthError::NotFound))
            .collect::<Result<Vec<_>, _>>()?;

        let id = RoleId::new(graph.next_id());
        graph.roles.insert(id, name.clone());
        for perm_id in perm_ids {
            graph.role_permissions.insert((id, perm_id));
        }
        Ok(graph.role_summary(id, name))
    }

    async fn delete_role(&self, name: &Role) -> Result<(), AuthError> {
        let mut graph = self.write()?;
        let id = graph.role_id(name).ok_or(AuthError::NotFound)?;
        graph.roles.remove(&id);
        graph.user_roles.retain(|(_, role_id)| *role_id != id);
        graph.role_permissions.retain(|(role_id, _)| *role_id != id);
        Ok(())
    }

    async fn assign_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError> {
        let mut graph = self.write()?;
        if !graph.principals.contains_key(&principal) {
            return Err(AuthError::NotFound);
        }
        let role_id = graph.role_id(role).ok_or(AuthError::NotFound)?;
        graph.user_roles.insert((principal, role_id));
        Ok(())
    }

    async fn revoke_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError> {
        let mut graph = self.write()?;
        if !graph.principals.contains_key(&principal) {
            return Err(AuthError::NotFound);
        }
        let role_id = graph.role_id(role).ok_or(AuthError::NotFound)?;
        graph.user_roles.remove(&(principal, role_id));
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<RoleSummary>, AuthError> {
        let graph = self.read()?;
        let mut roles: Vec<RoleSummary> = graph
            .roles
            .iter()
            .map(|(id, name)| graph.role_summary(*id, name))
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionSummary>, AuthError> {
        let graph = self.read()?;
        let mut permissions: Vec<PermissionSummary> = graph
            .permissions
            .iter()
            .map(|(id, name)| PermissionSummary {
                id: *id,
                name: name.clone(),
            })
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryAuthStore {
    async fn create_principal(
        &self,
        email: &Email,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<PrincipalSummary, AuthError> {
        let mut graph = self.write()?;
        if graph.principals.values().any(|p| p.email == email.as_str()) {
            return Err(AuthError::DuplicateName(email.to_string()));
        }

        let role_ids = roles
            .iter()
            .map(|r| graph.role_id(r).ok_or(AuthError::NotFound))
            .collect::<Result<Vec<_>, _>>()?;

        let record = PrincipalRecord {
            id: PrincipalId::new(graph.next_id()),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            enabled: true,
        };
        for role_id in role_ids {
            graph.user_roles.insert((record.id, role_id));
        }
        let summary = graph.principal_summary(&record);
        graph.principals.insert(record.id, record);
        Ok(summary)
    }

    async fn delete_principal(&self, id: PrincipalId) -> Result<(), AuthError> {
        let mut graph = self.write()?;
        if graph.principals.remove(&id).is_none() {
            return Err(AuthError::NotFound);
        }
        graph.user_roles.retain(|(principal, _)| *principal != id);
        Ok(())
    }

    async fn set_enabled(&self, id: PrincipalId, enabled: bool) -> Result<(), AuthError> {
        let mut graph = self.write()?;
        let record = graph.principals.get_mut(&id).ok_or(AuthError::NotFound)?;
        record.enabled = enabled;
        Ok(())
    }
}
