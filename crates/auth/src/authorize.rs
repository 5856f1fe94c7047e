use std::collections::BTreeSet;

use serde::Serialize;

use crate::{AuthError, Permission, Principal, Role};

/// The access requirement declared by a protected operation.
///
/// Satisfied when the principal holds **at least one** of `roles` (if any
/// are listed) **and all** of `permissions` (if any are listed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    roles: BTreeSet<Role>,
    permissions: BTreeSet<Permission>,
}

impl Requirement {
    /// Any authenticated principal.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any_role<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self::default().with_roles(roles)
    }

    pub fn all_permissions<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Self::default().with_permissions(permissions)
    }

    pub fn with_roles<I: IntoIterator<Item = Role>>(mut self, roles: I) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn with_permissions<I: IntoIterator<Item = Permission>>(mut self, permissions: I) -> Self {
        self.permissions.extend(permissions);
        self
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }
}

/// Why a grant was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantBasis {
    /// The principal meets the requirement on its own grants.
    Satisfied,
    /// The principal lacks a required permission but holds the admin role.
    AdminBypass,
}

/// Why a request was denied. Diagnostic only; callers see a uniform
/// "forbidden".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    MissingRole,
    MissingPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum Decision {
    Grant(GrantBasis),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Grant(_))
    }

    pub fn into_result(self) -> Result<GrantBasis, AuthError> {
        match self {
            Decision::Grant(basis) => Ok(basis),
            Decision::Deny(DenyReason::MissingRole) => Err(AuthError::MissingRole),
            Decision::Deny(DenyReason::MissingPermission) => Err(AuthError::MissingPermission),
        }
    }
}

/// Decide whether `principal` meets `requirement`.
///
/// - No IO
/// - No panics
/// - No hidden state (same inputs, same decision)
///
/// The role check and the permission check are independent conditions;
/// failing either denies. The admin role satisfies any permission
/// requirement, and such grants are reported as [`GrantBasis::AdminBypass`]
/// so callers can audit them. It does not satisfy a role requirement.
pub fn decide(principal: &Principal, requirement: &Requirement) -> Decision {
    let role_ok = requirement.roles.is_empty()
        || requirement.roles.iter().any(|r| principal.has_role(r));
    if !role_ok {
        return Decision::Deny(DenyReason::MissingRole);
    }

    let permissions_held = requirement
        .permissions
        .iter()
        .all(|p| principal.has_permission(p));
    if permissions_held {
        Decision::Grant(GrantBasis::Satisfied)
    } else if principal.is_admin() {
        Decision::Grant(GrantBasis::AdminBypass)
    } else {
        Decision::Deny(DenyReason::MissingPermission)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use raxerp_core::PrincipalId;

    use super::*;

    fn principal(roles: &[&str], permissions: &[&str]) -> Principal {
        Principal {
            id: PrincipalId::new(1),
            email: "p@example.com".to_string(),
            enabled: true,
            roles: roles.iter().map(|r| Role::new(r.to_string())).collect(),
            permissions: permissions
                .iter()
                .map(|p| Permission::new(p.to_string()))
                .collect(),
        }
    }

    fn roles(names: &[&str]) -> Vec<Role> {
        names.iter().map(|r| Role::new(r.to_string())).collect()
    }

    fn perms(names: &[&str]) -> Vec<Permission> {
        names.iter().map(|p| Permission::new(p.to_string())).collect()
    }

    #[test]
    fn empty_requirement_grants() {
        let p = principal(&[], &[]);
        assert_eq!(
            decide(&p, &Requirement::authenticated()),
            Decision::Grant(GrantBasis::Satisfied)
        );
    }

    #[test]
    fn user_requesting_admin_endpoint_is_denied_for_role() {
        let p = principal(&["user"], &[]);
        let req = Requirement::any_role([Role::ADMIN]);
        assert_eq!(decide(&p, &req), Decision::Deny(DenyReason::MissingRole));
        assert_eq!(decide(&p, &req).into_result(), Err(AuthError::MissingRole));
    }

    #[test]
    fn any_listed_role_is_enough() {
        let p = principal(&["moderator"], &[]);
        let req = Requirement::any_role(roles(&["admin", "moderator"]));
        assert!(decide(&p, &req).is_granted());
    }

    #[test]
    fn all_permissions_are_required() {
        let p = principal(&["editor"], &["edit_item"]);
        let req = Requirement::all_permissions(perms(&["edit_item", "create_item"]));
        assert_eq!(decide(&p, &req), Decision::Deny(DenyReason::MissingPermission));

        let p = principal(&["editor"], &["edit_item", "create_item", "view_stats"]);
        assert_eq!(decide(&p, &req), Decision::Grant(GrantBasis::Satisfied));
    }

    #[test]
    fn admin_bypasses_permissions_explicitly() {
        let p = principal(&["admin"], &[]);
        let req = Requirement::all_permissions(perms(&["delete_user"]));
        assert_eq!(decide(&p, &req), Decision::Grant(GrantBasis::AdminBypass));
    }

    #[test]
    fn admin_holding_permission_is_plainly_satisfied() {
        let p = principal(&["admin"], &["delete_user"]);
        let req = Requirement::all_permissions(perms(&["delete_user"]));
        assert_eq!(decide(&p, &req), Decision::Grant(GrantBasis::Satisfied));
    }

    #[test]
    fn admin_does_not_bypass_role_requirements() {
        let p = principal(&["admin"], &[]);
        let req = Requirement::any_role(roles(&["auditor"]));
        assert_eq!(decide(&p, &req), Decision::Deny(DenyReason::MissingRole));
    }

    #[test]
    fn role_check_precedes_permission_check() {
        let p = principal(&["user"], &[]);
        let req = Requirement::any_role(roles(&["editor"])).with_permissions(perms(&["edit_item"]));
        assert_eq!(decide(&p, &req), Decision::Deny(DenyReason::MissingRole));
    }

    const ROLE_POOL: &[&str] = &["admin", "user", "moderator", "editor"];
    const PERM_POOL: &[&str] = &["create_item", "delete_user", "view_stats", "edit_item"];

    fn subset(pool: &'static [&'static str]) -> impl Strategy<Value = Vec<&'static str>> {
        prop::sample::subsequence(pool, 0..=pool.len())
    }

    proptest! {
        #[test]
        fn grants_iff_role_disjunction_and_permission_conjunction(
            held_roles in subset(ROLE_POOL),
            held_perms in subset(PERM_POOL),
            req_roles in subset(ROLE_POOL),
            req_perms in subset(PERM_POOL),
        ) {
            let p = principal(&held_roles, &held_perms);
            let req = Requirement::any_role(roles(&req_roles)).with_permissions(perms(&req_perms));

            let role_ok = req_roles.is_empty() || req_roles.iter().any(|r| held_roles.contains(r));
            let perm_ok = req_perms.iter().all(|p| held_perms.contains(p))
                || held_roles.contains(&"admin");

            let decision = decide(&p, &req);
            prop_assert_eq!(decision.is_granted(), role_ok && perm_ok);
            // Idempotent: no hidden state.
            prop_assert_eq!(decide(&p, &req), decision);
        }

        #[test]
        fn admins_pass_any_permission_set(req_perms in subset(PERM_POOL)) {
            let p = principal(&["admin"], &[]);
            let req = Requirement::all_permissions(perms(&req_perms));
            prop_assert!(decide(&p, &req).is_granted());
        }
    }
}
