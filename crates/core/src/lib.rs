//! `raxerp-core`: shared building blocks for the RAX-ERP backend.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{PermissionId, PrincipalId, RoleId};
pub use value_object::Email;
