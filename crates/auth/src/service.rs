//! Public operation surface of the authorization core.

use std::sync::Arc;

use chrono::Duration;

use raxerp_core::{Email, PrincipalId};

use crate::password::hash_blocking;
use crate::store::{AuthStore, PrincipalDirectory, RoleGraph};
use crate::{
    AuthError, Authenticator, GrantBasis, IssuedToken, PasswordHasher, Permission,
    PermissionSummary, Principal, PrincipalSummary, Requirement, Role, RoleSummary, TokenService,
    check_ttl, decide,
};

/// Login, registration, role/permission administration and per-request
/// authorization, wired over one injected store handle.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    hasher: Arc<dyn PasswordHasher>,
    authenticator: Authenticator,
    token_ttl: Duration,
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService")
            .field("authenticator", &self.authenticator)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenService,
        token_ttl: Duration,
    ) -> Result<Self, AuthError> {
        check_ttl(token_ttl)?;
        let authenticator = Authenticator::new(store.clone(), hasher.clone(), tokens);
        Ok(Self {
            store,
            hasher,
            authenticator,
            token_ttl,
        })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Verify a credential and mint a session token carrying the principal's
    /// current role names.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let principal = self
            .authenticator
            .authenticate_by_credential(email, password)
            .await?;
        let issued = self.authenticator.tokens().issue(
            principal.id,
            &principal.email,
            principal.role_names(),
            self.token_ttl,
        )?;
        tracing::info!(principal_id = %principal.id, "principal logged in");
        Ok(issued)
    }

    /// Create a principal holding `role_names`. Every role must exist.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role_names: &[String],
    ) -> Result<PrincipalSummary, AuthError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(AuthError::validation("password cannot be empty"));
        }
        let roles = role_names
            .iter()
            .map(|name| Role::parse(name))
            .collect::<Result<Vec<_>, _>>()?;

        let hash = hash_blocking(self.hasher.clone(), password).await?;
        let summary = self.store.create_principal(&email, &hash, &roles).await?;
        tracing::info!(principal_id = %summary.id, roles = ?summary.roles, "principal registered");
        Ok(summary)
    }

    pub async fn create_role(
        &self,
        name: &str,
        permission_names: &[String],
    ) -> Result<RoleSummary, AuthError> {
        let role = Role::parse(name)?;
        let permissions = permission_names
            .iter()
            .map(|name| Permission::parse(name))
            .collect::<Result<Vec<_>, _>>()?;

        let summary = self.store.create_role(&role, &permissions).await?;
        tracing::info!(role = %summary.name, permissions = ?summary.permissions, "role created");
        Ok(summary)
    }

    pub async fn create_permission(&self, name: &str) -> Result<PermissionSummary, AuthError> {
        let permission = Permission::parse(name)?;
        let summary = self.store.create_permission(&permission).await?;
        tracing::info!(permission = %summary.name, "permission created");
        Ok(summary)
    }

    /// Hard delete. Tokens already issued to the principal stop
    /// authenticating on their next use.
    pub async fn delete_principal(&self, id: PrincipalId) -> Result<(), AuthError> {
        self.store.delete_principal(id).await?;
        tracing::info!(principal_id = %id, "principal deleted");
        Ok(())
    }

    pub async fn set_principal_enabled(
        &self,
        id: PrincipalId,
        enabled: bool,
    ) -> Result<(), AuthError> {
        self.store.set_enabled(id, enabled).await?;
        tracing::info!(principal_id = %id, enabled, "principal enabled flag changed");
        Ok(())
    }

    pub async fn assign_role(&self, id: PrincipalId, role: &str) -> Result<(), AuthError> {
        let role = Role::parse(role)?;
        self.store.assign_role(id, &role).await?;
        tracing::info!(principal_id = %id, %role, "role assigned");
        Ok(())
    }

    pub async fn revoke_role(&self, id: PrincipalId, role: &str) -> Result<(), AuthError> {
        let role = Role::parse(role)?;
        self.store.revoke_role(id, &role).await?;
        tracing::info!(principal_id = %id, %role, "role revoked");
        Ok(())
    }

    pub async fn delete_role(&self, name: &str) -> Result<(), AuthError> {
        let role = Role::parse(name)?;
        self.store.delete_role(&role).await?;
        tracing::info!(%role, "role deleted");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleSummary>, AuthError> {
        self.store.list_roles().await
    }

    pub async fn list_permissions(&self) -> Result<Vec<PermissionSummary>, AuthError> {
        self.store.list_permissions().await
    }

    /// Authenticate `token` and check it against `requirement`.
    pub async fn authorize(
        &self,
        token: &str,
        requirement: &Requirement,
    ) -> Result<Principal, AuthError> {
        let principal = self.authenticator.authenticate_by_token(token).await?;
        self.check(&principal, requirement)?;
        Ok(principal)
    }

    /// Run the decision procedure for an already authenticated principal.
    /// Admin bypass grants are logged for audit.
    pub fn check(
        &self,
        principal: &Principal,
        requirement: &Requirement,
    ) -> Result<GrantBasis, AuthError> {
        let decision = decide(principal, requirement);
        match decision.into_result() {
            Ok(GrantBasis::AdminBypass) => {
                tracing::info!(
                    principal_id = %principal.id,
                    permissions = ?requirement.permissions(),
                    "permission requirement satisfied by admin bypass"
                );
                Ok(GrantBasis::AdminBypass)
            }
            Ok(basis) => Ok(basis),
            Err(e) => {
                tracing::debug!(principal_id = %principal.id, ?decision, "authorization denied");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialStore;
    use crate::testing::{Fixture, PASSWORD};

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn login_issues_token_with_role_snapshot() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[Role::USER]).await;

        let issued = fx.service().login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(issued.claims.uid, id);
        assert_eq!(issued.claims.sub, "alice@example.com");
        assert_eq!(issued.claims.roles, vec![Role::USER]);
        assert_eq!(issued.ttl_seconds(), Fixture::TTL_MINUTES * 60);
    }

    #[tokio::test]
    async fn scenario_wrong_password_is_bad_credential() {
        let fx = Fixture::new().await;
        fx.principal("alice@example.com", &[Role::USER]).await;
        assert_eq!(
            fx.service().login("alice@example.com", "nope").await,
            Err(AuthError::BadCredential)
        );
    }

    #[tokio::test]
    async fn register_then_login() {
        let fx = Fixture::new().await;
        let svc = fx.service();

        let summary = svc
            .register("bob@example.com", "hunter2", &names(&["user"]))
            .await
            .unwrap();
        assert_eq!(summary.email, "bob@example.com");
        assert_eq!(summary.roles, vec![Role::USER]);
        assert!(summary.enabled);

        let stored = fx.store.find_by_id(summary.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter2");

        let issued = svc.login("bob@example.com", "hunter2").await.unwrap();
        assert_eq!(issued.claims.uid, summary.id);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let fx = Fixture::new().await;
        let svc = fx.service();

        assert!(matches!(
            svc.register("not-an-email", "pw", &[]).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            svc.register("a@example.com", "", &[]).await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(
            svc.register("a@example.com", "pw", &names(&["ghost"])).await,
            Err(AuthError::NotFound)
        );
        assert_eq!(fx.store.find_by_email("a@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        svc.register("bob@example.com", "pw", &[]).await.unwrap();
        assert!(matches!(
            svc.register("bob@example.com", "pw2", &[]).await,
            Err(AuthError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn scenario_duplicate_role_name() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        svc.create_permission("edit_item").await.unwrap();

        let editor = svc.create_role("editor", &names(&["edit_item"])).await.unwrap();
        assert_eq!(editor.permissions, vec![Permission::new("edit_item")]);

        assert_eq!(
            svc.create_role("editor", &names(&["view_stats"])).await,
            Err(AuthError::DuplicateName("editor".to_string()))
        );
    }

    #[tokio::test]
    async fn create_role_with_unknown_permission_is_not_found() {
        let fx = Fixture::new().await;
        assert_eq!(
            fx.service().create_role("editor", &names(&["edit_item"])).await,
            Err(AuthError::NotFound)
        );
    }

    #[tokio::test]
    async fn duplicate_permission_is_rejected() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.service().create_permission("view_stats").await,
            Err(AuthError::DuplicateName(_))
        ));
        assert!(matches!(
            fx.service().create_permission("  ").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn scenario_user_requesting_admin_role_is_missing_role() {
        let fx = Fixture::new().await;
        let id = fx.principal("user@example.com", &[Role::USER]).await;
        let token = fx.token_for(id, "user@example.com", vec![Role::USER]);

        assert_eq!(
            fx.service()
                .authorize(&token, &Requirement::any_role([Role::ADMIN]))
                .await,
            Err(AuthError::MissingRole)
        );
    }

    #[tokio::test]
    async fn scenario_deleted_principal_token_is_not_found() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let id = fx.principal("temp@example.com", &[Role::USER]).await;
        let issued = svc.login("temp@example.com", PASSWORD).await.unwrap();

        svc.delete_principal(id).await.unwrap();
        assert_eq!(
            svc.authorize(&issued.access_token, &Requirement::authenticated()).await,
            Err(AuthError::NotFound)
        );
        assert_eq!(svc.delete_principal(id).await, Err(AuthError::NotFound));
    }

    #[tokio::test]
    async fn revocation_applies_to_existing_tokens() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let id = fx.principal("mod@example.com", &[Role::ADMIN]).await;
        let issued = svc.login("mod@example.com", PASSWORD).await.unwrap();
        let admin_only = Requirement::any_role([Role::ADMIN]);

        assert!(svc.authorize(&issued.access_token, &admin_only).await.is_ok());
        svc.revoke_role(id, "admin").await.unwrap();
        assert_eq!(
            svc.authorize(&issued.access_token, &admin_only).await,
            Err(AuthError::MissingRole)
        );
    }

    #[tokio::test]
    async fn disabling_blocks_login_and_tokens() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let id = fx.principal("carol@example.com", &[Role::USER]).await;
        let issued = svc.login("carol@example.com", PASSWORD).await.unwrap();

        svc.set_principal_enabled(id, false).await.unwrap();
        assert_eq!(
            svc.login("carol@example.com", PASSWORD).await,
            Err(AuthError::AccountDisabled)
        );
        assert_eq!(
            svc.authorize(&issued.access_token, &Requirement::authenticated()).await,
            Err(AuthError::AccountDisabled)
        );

        svc.set_principal_enabled(id, true).await.unwrap();
        assert!(svc.login("carol@example.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn check_reports_admin_bypass() {
        let fx = Fixture::new().await;
        let id = fx.principal("root@example.com", &[Role::ADMIN]).await;
        let token = fx.token_for(id, "root@example.com", vec![Role::ADMIN]);
        let svc = fx.service();

        let principal = svc.authenticator().authenticate_by_token(&token).await.unwrap();
        let requirement = Requirement::all_permissions([Permission::DELETE_USER]);
        assert_eq!(svc.check(&principal, &requirement), Ok(GrantBasis::AdminBypass));
    }

    #[tokio::test]
    async fn delete_role_cascades_to_principals() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        svc.create_permission("edit_item").await.unwrap();
        svc.create_role("editor", &names(&["edit_item"])).await.unwrap();
        let id = fx.principal("ed@example.com", &[Role::new("editor")]).await;

        svc.delete_role("editor").await.unwrap();
        let issued = svc.login("ed@example.com", PASSWORD).await.unwrap();
        assert!(issued.claims.roles.is_empty());
        assert_eq!(svc.assign_role(id, "editor").await, Err(AuthError::NotFound));
    }

    #[tokio::test]
    async fn listings_are_sorted_by_name() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let roles: Vec<_> = svc
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(roles, vec![Role::ADMIN, Role::MODERATOR, Role::USER]);

        let permissions: Vec<_> = svc
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name.to_string())
            .collect();
        assert_eq!(permissions, vec!["create_user", "delete_user", "view_stats"]);
    }

    #[test]
    fn rejects_ttl_outside_bounds() {
        let fx = Fixture::blank();
        for ttl in [
            Duration::zero(),
            Duration::seconds(crate::MAX_TOKEN_TTL_SECONDS + 1),
        ] {
            let result = AuthService::new(
                fx.store.clone(),
                fx.hasher.clone(),
                fx.tokens.clone(),
                ttl,
            );
            assert!(matches!(result, Err(AuthError::Validation(_))), "{ttl:?}");
        }
    }
}
