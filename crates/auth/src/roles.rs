use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::AuthError;

const MAX_NAME_LEN: usize = 64;

/// Role identifier used for RBAC.
///
/// Roles are free-text names. A closed set of well-known roles is exposed as
/// constants; of those, only [`Role::ADMIN`] carries special meaning (it
/// satisfies every permission requirement, see [`crate::decide`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const MODERATOR: Role = Role(Cow::Borrowed("moderator"));
    pub const USER: Role = Role(Cow::Borrowed("user"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Validate a user-supplied role name.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        validate_name("role", raw).map(|name| Self(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }

    pub fn is_well_known(&self) -> bool {
        [Self::ADMIN, Self::MODERATOR, Self::USER]
            .iter()
            .any(|known| known.as_str() == self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared name rules for roles and permissions.
pub(crate) fn validate_name(kind: &str, raw: &str) -> Result<String, AuthError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AuthError::validation(format!("{kind} name cannot be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AuthError::validation(format!(
            "{kind} name cannot exceed {MAX_NAME_LEN} bytes"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::validation(format!(
            "{kind} name cannot contain whitespace"
        )));
    }
    Ok(name.to_string())
}
