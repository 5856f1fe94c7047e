//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::Duration;

use raxerp_core::{Email, PrincipalId};

use crate::store::{InMemoryAuthStore, PrincipalDirectory, RoleGraph};
use crate::{
    Argon2PasswordHasher, AuthService, Authenticator, PasswordHasher, Permission, RequestGate,
    Role, TokenService,
};

pub(crate) const PASSWORD: &str = "correct horse battery staple";

const SECRET: &[u8] = b"unit-test-secret";

pub(crate) struct Fixture {
    pub store: Arc<InMemoryAuthStore>,
    pub hasher: Arc<Argon2PasswordHasher>,
    pub tokens: TokenService,
}

impl Fixture {
    pub const TTL_MINUTES: i64 = 30;

    /// Empty store, cheap hasher.
    pub fn blank() -> Self {
        Self {
            store: Arc::new(InMemoryAuthStore::new()),
            hasher: Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap()),
            tokens: TokenService::new(SECRET).unwrap(),
        }
    }

    /// Seeded catalog: permissions `create_user`, `delete_user`, `view_stats`;
    /// roles `admin` (no explicit permissions), `moderator`, and `user`
    /// (`view_stats`).
    pub async fn new() -> Self {
        let fx = Self::blank();
        for name in ["create_user", "delete_user", "view_stats"] {
            fx.store.create_permission(&Permission::new(name)).await.unwrap();
        }
        fx.store.create_role(&Role::ADMIN, &[]).await.unwrap();
        fx.store.create_role(&Role::MODERATOR, &[]).await.unwrap();
        fx.store
            .create_role(&Role::USER, &[Permission::new("view_stats")])
            .await
            .unwrap();
        fx
    }

    /// Create a principal whose password is [`PASSWORD`].
    pub async fn principal(&self, email: &str, roles: &[Role]) -> PrincipalId {
        let hash = self.hasher.hash(PASSWORD).unwrap();
        self.store
            .create_principal(&Email::parse(email).unwrap(), &hash, roles)
            .await
            .unwrap()
            .id
    }

    pub fn token_for(&self, id: PrincipalId, email: &str, roles: Vec<Role>) -> String {
        self.tokens
            .issue(id, email, roles, Duration::minutes(Self::TTL_MINUTES))
            .unwrap()
            .access_token
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.store.clone(), self.hasher.clone(), self.tokens.clone())
    }

    pub fn service(&self) -> AuthService {
        AuthService::new(
            self.store.clone(),
            self.hasher.clone(),
            self.tokens.clone(),
            Duration::minutes(Self::TTL_MINUTES),
        )
        .unwrap()
    }

    pub fn gate(&self) -> RequestGate {
        RequestGate::new(Arc::new(self.service()))
    }
}
