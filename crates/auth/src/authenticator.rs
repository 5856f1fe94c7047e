use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::password::verify_blocking;
use crate::store::{AuthStore, CredentialStore, RoleGraph};
use crate::{AuthError, PasswordHasher, Principal, PrincipalRecord, SessionClaims, TokenService};

/// Plaintext hashed once at construction; verifying against it on unknown
/// emails keeps the cost of a failed lookup in line with a failed password.
const DUMMY_PASSWORD: &str = "raxerp-dummy-password";

/// Turns a presented credential or session token into a resolved
/// [`Principal`].
///
/// Read-only: nothing here mutates the store. Roles and permissions are
/// always resolved live, so revocations apply on the next request.
pub struct Authenticator {
    store: Arc<dyn AuthStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenService,
    dummy_hash: Option<String>,
}

impl core::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authenticator")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn AuthStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenService,
    ) -> Self {
        let dummy_hash = match hasher.hash(DUMMY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, "could not prepare dummy password hash");
                None
            }
        };
        Self {
            store,
            hasher,
            tokens,
            dummy_hash,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Verify `email` + `password` and resolve the principal's grants.
    ///
    /// Checks run in order: lookup (`NotFound`), password (`BadCredential`),
    /// enabled flag (`AccountDisabled`). The disabled check comes after the
    /// password so a disabled account is only revealed to its owner.
    pub async fn authenticate_by_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let Some(record) = self.store.find_by_email(email).await? else {
            if let Some(dummy) = &self.dummy_hash {
                let _ = verify_blocking(self.hasher.clone(), password, dummy).await;
            }
            tracing::warn!("credential rejected: unknown principal");
            return Err(AuthError::NotFound);
        };

        if !verify_blocking(self.hasher.clone(), password, &record.password_hash).await? {
            tracing::warn!(principal_id = %record.id, "credential rejected: bad password");
            return Err(AuthError::BadCredential);
        }
        if !record.enabled {
            tracing::warn!(principal_id = %record.id, "credential rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        self.resolve(record).await
    }

    pub async fn authenticate_by_token(&self, token: &str) -> Result<Principal, AuthError> {
        self.authenticate_by_token_at(token, Utc::now()).await
    }

    /// Validate `token` as of `now`, then re-read the principal and its grants.
    ///
    /// The token's role snapshot is ignored. A principal deleted after
    /// issuance yields `NotFound`; one disabled after issuance yields
    /// `AccountDisabled`.
    pub async fn authenticate_by_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthError> {
        let claims = self.tokens.validate_at(token, now)?;
        let record = self.principal_for(&claims).await?;

        if !record.enabled {
            tracing::warn!(principal_id = %record.id, "token rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        self.resolve(record).await
    }

    async fn principal_for(&self, claims: &SessionClaims) -> Result<PrincipalRecord, AuthError> {
        let record = self.store.find_by_id(claims.uid).await?.ok_or_else(|| {
            tracing::warn!(
                principal_id = %claims.uid,
                "token rejected: principal no longer exists"
            );
            AuthError::NotFound
        })?;

        // A token names both the id and the email; both must still agree.
        if record.email != claims.sub {
            tracing::warn!(
                principal_id = %claims.uid,
                "token rejected: subject does not match principal"
            );
            return Err(AuthError::TokenInvalid);
        }
        Ok(record)
    }

    async fn resolve(&self, record: PrincipalRecord) -> Result<Principal, AuthError> {
        let grants = self.store.resolve_grants(record.id).await?;
        Ok(Principal::from_parts(record, grants))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::{PrincipalDirectory, RoleGraph};
    use crate::testing::{Fixture, PASSWORD};
    use crate::{Permission, Role};

    #[tokio::test]
    async fn credential_login_resolves_live_grants() {
        let fx = Fixture::new().await;
        let alice = fx.principal("alice@example.com", &[Role::USER]).await;

        let principal = fx
            .authenticator()
            .authenticate_by_credential("alice@example.com", PASSWORD)
            .await
            .unwrap();
        assert_eq!(principal.id, alice);
        assert_eq!(principal.role_names(), vec![Role::USER]);
        assert!(principal.has_permission(&Permission::new("view_stats")));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let fx = Fixture::new().await;
        assert_eq!(
            fx.authenticator()
                .authenticate_by_credential("nobody@example.com", PASSWORD)
                .await,
            Err(AuthError::NotFound)
        );
    }

    #[tokio::test]
    async fn email_match_is_case_sensitive() {
        let fx = Fixture::new().await;
        fx.principal("alice@example.com", &[]).await;
        assert_eq!(
            fx.authenticator()
                .authenticate_by_credential("Alice@example.com", PASSWORD)
                .await,
            Err(AuthError::NotFound)
        );
    }

    #[tokio::test]
    async fn wrong_password_is_bad_credential() {
        let fx = Fixture::new().await;
        fx.principal("alice@example.com", &[]).await;
        assert_eq!(
            fx.authenticator()
                .authenticate_by_credential("alice@example.com", "wrong")
                .await,
            Err(AuthError::BadCredential)
        );
    }

    #[tokio::test]
    async fn disabled_account_is_rejected_after_password_check() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[]).await;
        fx.store.set_enabled(id, false).await.unwrap();

        let auth = fx.authenticator();
        assert_eq!(
            auth.authenticate_by_credential("alice@example.com", PASSWORD).await,
            Err(AuthError::AccountDisabled)
        );
        assert_eq!(
            auth.authenticate_by_credential("alice@example.com", "wrong").await,
            Err(AuthError::BadCredential)
        );
    }

    #[tokio::test]
    async fn token_authentication_re_resolves_roles() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[Role::USER]).await;
        let auth = fx.authenticator();
        let token = fx.token_for(id, "alice@example.com", vec![Role::USER]);

        fx.store.assign_role(id, &Role::ADMIN).await.unwrap();
        fx.store.revoke_role(id, &Role::USER).await.unwrap();

        let principal = auth.authenticate_by_token(&token).await.unwrap();
        assert_eq!(principal.role_names(), vec![Role::ADMIN]);
        assert!(!principal.has_permission(&Permission::new("view_stats")));
    }

    #[tokio::test]
    async fn token_for_deleted_principal_is_not_found() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[Role::USER]).await;
        let token = fx.token_for(id, "alice@example.com", vec![Role::USER]);

        fx.store.delete_principal(id).await.unwrap();
        assert_eq!(
            fx.authenticator().authenticate_by_token(&token).await,
            Err(AuthError::NotFound)
        );
    }

    #[tokio::test]
    async fn token_for_disabled_principal_is_rejected() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[]).await;
        let token = fx.token_for(id, "alice@example.com", vec![]);

        fx.store.set_enabled(id, false).await.unwrap();
        assert_eq!(
            fx.authenticator().authenticate_by_token(&token).await,
            Err(AuthError::AccountDisabled)
        );
    }

    #[tokio::test]
    async fn token_subject_must_match_principal() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[]).await;
        let token = fx.token_for(id, "mallory@example.com", vec![Role::ADMIN]);

        assert_eq!(
            fx.authenticator().authenticate_by_token(&token).await,
            Err(AuthError::TokenInvalid)
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected_before_lookup() {
        let fx = Fixture::new().await;
        let id = fx.principal("alice@example.com", &[]).await;
        let token = fx.token_for(id, "alice@example.com", vec![]);

        let later = Utc::now() + Duration::days(1);
        assert_eq!(
            fx.authenticator().authenticate_by_token_at(&token, later).await,
            Err(AuthError::TokenExpired)
        );
    }
}
