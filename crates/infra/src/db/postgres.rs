//! Postgres-backed auth store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | AuthError | Scenario |
//! |------------|----------------------|-----------|----------|
//! | Database (unique violation) | `23505` | `DuplicateName` | Email, role or permission name already taken |
//! | Database (foreign key violation) | `23503` | `NotFound` | Endpoint deleted by a concurrent transaction |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! Storage errors surface as server faults, never as authorization denials.
//!
//! ## Consistency
//!
//! Grant resolution is one statement, so it reads one snapshot. Multi-step
//! writes run in a transaction; a transaction abandoned on an error path rolls
//! back when dropped. No in-process locks: several processes may share the
//! database.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use raxerp_auth::{
    AuthError, CredentialStore, Grants, Permission, PermissionSummary, PrincipalDirectory,
    PrincipalRecord, PrincipalSummary, Role, RoleGraph, RoleSummary,
};
use raxerp_core::{Email, PermissionId, PrincipalId, RoleId};

const SCHEMA: &str = include_str!("../../migrations/0001_auth_schema.sql");

const MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct PostgresAuthStore {
    pool: Arc<PgPool>,
}

impl PostgresAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, AuthError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the auth tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AuthError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AuthError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl CredentialStore for PostgresAuthStore {
    #[instrument(skip(self), level = "debug")]
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, AuthError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, enabled FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.as_ref()
            .map(principal_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_by_email", e))
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, AuthError> {
        let row = sqlx::query("SELECT id, email, password_hash, enabled FROM users WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref()
            .map(principal_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_by_id", e))
    }
}

#[async_trait]
impl RoleGraph for PostgresAuthStore {
    #[instrument(skip(self), level = "debug")]
    async fn roles_of(&self, principal: PrincipalId) -> Result<BTreeSet<Role>, AuthError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(principal.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_of", e))?;

        Ok(names.into_iter().map(Role::new).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn permissions_of(&self, role: &Role) -> Result<BTreeSet<Permission>, AuthError> {
        // One row per permission, or a single NULL row for a role without any.
        let names: Vec<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT p.name
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE r.name = $1
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("permissions_of", e))?;

        if names.is_empty() {
            return Err(AuthError::NotFound);
        }
        Ok(names.into_iter().flatten().map(Permission::new).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn resolve_grants(&self, principal: PrincipalId) -> Result<Grants, AuthError> {
        let rows = sqlx::query(
            r#"
            SELECT r.name AS role_name, p.name AS permission_name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(principal.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("resolve_grants", e))?;

        let mut grants = Grants::default();
        for row in rows {
            let role: String = row
                .try_get("role_name")
                .map_err(|e| map_sqlx_error("resolve_grants", e))?;
            let permission: Option<String> = row
                .try_get("permission_name")
                .map_err(|e| map_sqlx_error("resolve_grants", e))?;
            grants.roles.insert(Role::new(role));
            if let Some(permission) = permission {
                grants.permissions.insert(Permission::new(permission));
            }
        }
        Ok(grants)
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_permission(&self, name: &Permission) -> Result<PermissionSummary, AuthError> {
        let id: i64 = sqlx::query_scalar("INSERT INTO permissions (name) VALUES ($1) RETURNING id")
            .bind(name.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| duplicate_or(name.as_str(), "create_permission", e))?;

        Ok(PermissionSummary {
            id: PermissionId::new(id),
            name: name.clone(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_role(
        &self,
        name: &Role,
        permissions: &[Permission],
    ) -> Result<RoleSummary, AuthError> {
        let mut tx = self.begin().await?;

        let role_id: i64 = sqlx::query_scalar("INSERT INTO roles (name) VALUES ($1) RETURNING id")
            .bind(name.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| duplicate_or(name.as_str(), "create_role", e))?;

        let wanted: BTreeSet<&str> = permissions.iter().map(Permission::as_str).collect();
        let found = lookup_ids(&mut tx, "permissions", &wanted).await?;
        let permission_ids: Vec<i64> = found.iter().map(|(id, _)| *id).collect();

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, unnest($2::BIGINT[])
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(RoleSummary {
            id: RoleId::new(role_id),
            name: name.clone(),
            permissions: found.into_iter().map(|(_, n)| Permission::new(n)).collect(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_role(&self, name: &Role) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM roles WHERE name = $1")
            .bind(name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn assign_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError> {
        let mut tx = self.begin().await?;
        let role_id = edge_endpoints(&mut tx, principal, role).await?;

        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(principal.get())
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), level = "debug")]
    async fn revoke_role(&self, principal: PrincipalId, role: &Role) -> Result<(), AuthError> {
        let mut tx = self.begin().await?;
        let role_id = edge_endpoints(&mut tx, principal, role).await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(principal.get())
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_roles(&self) -> Result<Vec<RoleSummary>, AuthError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, p.name AS permission_name
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            ORDER BY r.name COLLATE "C", p.id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;

        let flat = rows
            .iter()
            .map(|row| {
                Ok((
                    row.try_get::<i64, _>("id")?,
                    row.try_get::<String, _>("name")?,
                    row.try_get::<Option<String>, _>("permission_name")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        Ok(group_role_rows(flat))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_permissions(&self) -> Result<Vec<PermissionSummary>, AuthError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as(r#"SELECT id, name FROM permissions ORDER BY name COLLATE "C""#)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_permissions", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| PermissionSummary {
                id: PermissionId::new(id),
                name: Permission::new(name),
            })
            .collect())
    }
}

#[async_trait]
impl PrincipalDirectory for PostgresAuthStore {
    #[instrument(skip(self, password_hash), level = "debug")]
    async fn create_principal(
        &self,
        email: &Email,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<PrincipalSummary, AuthError> {
        let mut tx = self.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_or(email.as_str(), "create_principal", e))?;

        let wanted: BTreeSet<&str> = roles.iter().map(Role::as_str).collect();
        let found = lookup_ids(&mut tx, "roles", &wanted).await?;
        let role_ids: Vec<i64> = found.iter().map(|(id, _)| *id).collect();

        sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, unnest($2::BIGINT[])")
            .bind(id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_principal", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(PrincipalSummary {
            id: PrincipalId::new(id),
            email: email.to_string(),
            enabled: true,
            roles: found.into_iter().map(|(_, n)| Role::new(n)).collect(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_principal(&self, id: PrincipalId) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_principal", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_enabled(&self, id: PrincipalId, enabled: bool) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET enabled = $2 WHERE id = $1")
            .bind(id.get())
            .bind(enabled)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_enabled", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }
}

/// Resolve `(id, name)` pairs for every name in `wanted`, ordered by id.
/// Any unknown name fails the whole lookup with `NotFound`.
async fn lookup_ids(
    tx: &mut Transaction<'static, Postgres>,
    table: &'static str,
    wanted: &BTreeSet<&str>,
) -> Result<Vec<(i64, String)>, AuthError> {
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = wanted.iter().map(|n| n.to_string()).collect();
    let query = format!("SELECT id, name FROM {table} WHERE name = ANY($1) ORDER BY id");
    let found: Vec<(i64, String)> = sqlx::query_as(&query)
        .bind(names)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lookup_ids", e))?;

    if found.len() != wanted.len() {
        return Err(AuthError::NotFound);
    }
    Ok(found)
}

/// Lock the principal row and resolve the role id for an assignment edge.
async fn edge_endpoints(
    tx: &mut Transaction<'static, Postgres>,
    principal: PrincipalId,
    role: &Role,
) -> Result<i64, AuthError> {
    let user: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR SHARE")
        .bind(principal.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("edge_endpoints", e))?;
    if user.is_none() {
        return Err(AuthError::NotFound);
    }

    let role_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM roles WHERE name = $1 FOR SHARE")
            .bind(role.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("edge_endpoints", e))?;
    role_id.ok_or(AuthError::NotFound)
}

fn principal_from_row(row: &PgRow) -> Result<PrincipalRecord, sqlx::Error> {
    Ok(PrincipalRecord {
        id: PrincipalId::new(row.try_get("id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        enabled: row.try_get("enabled")?,
    })
}

/// Fold `(role_id, role_name, permission_name)` rows, already ordered by role,
/// into one summary per role.
fn group_role_rows(rows: Vec<(i64, String, Option<String>)>) -> Vec<RoleSummary> {
    let mut summaries: Vec<RoleSummary> = Vec::new();
    for (id, name, permission) in rows {
        let id = RoleId::new(id);
        if summaries.last().is_none_or(|last| last.id != id) {
            summaries.push(RoleSummary {
                id,
                name: Role::new(name),
                permissions: Vec::new(),
            });
        }
        if let (Some(permission), Some(last)) = (permission, summaries.last_mut()) {
            last.permissions.push(Permission::new(permission));
        }
    }
    summaries
}

fn duplicate_or(name: &str, operation: &str, err: sqlx::Error) -> AuthError {
    if is_unique_violation(&err) {
        AuthError::DuplicateName(name.to_string())
    } else {
        map_sqlx_error(operation, err)
    }
}

/// Map SQLx errors to `AuthError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuthError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => AuthError::DuplicateName(
                db_err.constraint().unwrap_or("unique constraint").to_string(),
            ),
            Some("23503") => AuthError::NotFound,
            _ => AuthError::storage(format!(
                "database error in {operation}: {}",
                db_err.message()
            )),
        },
        sqlx::Error::PoolClosed => {
            AuthError::storage(format!("connection pool closed in {operation}"))
        }
        other => AuthError::storage(format!("sqlx error in {operation}: {other}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
