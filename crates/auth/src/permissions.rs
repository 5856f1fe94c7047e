use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Permission identifier.
///
/// Permissions are atomic capabilities modeled as opaque names
/// (e.g. `"create_item"`, `"delete_user"`). The catalog lives in storage;
/// the constants below are the names the HTTP surface gates on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const CREATE_USER: Permission = Permission(Cow::Borrowed("create_user"));
    pub const DELETE_USER: Permission = Permission(Cow::Borrowed("delete_user"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Validate a user-supplied permission name.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        crate::roles::validate_name("permission", raw).map(|name| Self(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
