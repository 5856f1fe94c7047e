use std::sync::Arc;

use uuid::Uuid;

use raxerp_auth::{Permission, Principal, Role};
use raxerp_core::PrincipalId;

/// Correlation id for one gated request (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Principal context for a request (authenticated identity + live grants).
///
/// Inserted by the gate middleware once the request is authorized; handlers
/// treat it as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Arc<Principal>,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Arc::new(principal),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id
    }

    pub fn email(&self) -> &str {
        &self.principal.email
    }

    pub fn roles(&self) -> Vec<Role> {
        self.principal.role_names()
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.principal.permissions.iter().cloned().collect()
    }
}
