//! Startup seeding: the well-known role/permission catalog and the first
//! administrator.

use anyhow::Context;

use raxerp_auth::{AuthError, AuthService, AuthStore, CredentialStore, Permission, Role};
use raxerp_core::PrincipalId;

use crate::config::AdminSeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(PrincipalId),
    AlreadyPresent(PrincipalId),
}

/// Create the well-known roles and the permissions the HTTP surface gates
/// on. Entries that already exist are left untouched.
pub async fn seed_catalog(service: &AuthService) -> anyhow::Result<()> {
    for permission in [Permission::CREATE_USER, Permission::DELETE_USER] {
        ignore_duplicate(service.create_permission(permission.as_str()).await)
            .with_context(|| format!("failed to seed permission '{permission}'"))?;
    }
    for role in [Role::ADMIN, Role::MODERATOR, Role::USER] {
        ignore_duplicate(service.create_role(role.as_str(), &[]).await)
            .with_context(|| format!("failed to seed role '{role}'"))?;
    }
    Ok(())
}

/// Make sure the seeded administrator exists and holds the `admin` role.
///
/// Idempotent. An existing principal keeps its password; only the role
/// assignment is repaired.
pub async fn ensure_admin(
    service: &AuthService,
    store: &dyn AuthStore,
    seed: &AdminSeed,
) -> anyhow::Result<BootstrapOutcome> {
    seed_catalog(service).await?;

    if let Some(existing) = store
        .find_by_email(&seed.email)
        .await
        .context("failed to look up bootstrap administrator")?
    {
        service
            .assign_role(existing.id, Role::ADMIN.as_str())
            .await
            .context("failed to grant admin role to bootstrap administrator")?;
        tracing::info!(principal_id = %existing.id, "bootstrap administrator already present");
        return Ok(BootstrapOutcome::AlreadyPresent(existing.id));
    }

    let admin_role = vec![Role::ADMIN.to_string()];
    match service.register(&seed.email, &seed.password, &admin_role).await {
        Ok(summary) => {
            tracing::info!(principal_id = %summary.id, "bootstrap administrator created");
            Ok(BootstrapOutcome::Created(summary.id))
        }
        // Another instance created it between the lookup and the insert.
        Err(AuthError::DuplicateName(_)) => {
            let existing = store
                .find_by_email(&seed.email)
                .await?
                .context("bootstrap administrator vanished during creation")?;
            Ok(BootstrapOutcome::AlreadyPresent(existing.id))
        }
        Err(e) => Err(e).context("failed to create bootstrap administrator"),
    }
}

fn ignore_duplicate<T>(result: Result<T, AuthError>) -> Result<(), AuthError> {
    match result {
        Ok(_) | Err(AuthError::DuplicateName(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
