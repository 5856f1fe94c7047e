//! Principal administration: registration, deletion, role assignment and
//! the enabled flag.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};

use raxerp_core::PrincipalId;

use crate::app::{AppState, dto, errors};

pub fn register_router() -> Router {
    Router::new().route("/register", post(register))
}

pub fn delete_router() -> Router {
    Router::new().route("/users/:id", delete(delete_user))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role", delete(revoke_role))
        .route("/users/:id/enable", post(enable_user))
        .route("/users/:id/disable", post(disable_user))
}

fn parse_principal_id(raw: &str) -> Result<PrincipalId, axum::response::Response> {
    PrincipalId::from_str(raw).map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
    })
}

/// POST /register - create a principal with the given roles.
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    match state
        .service
        .register(&body.email, &body.password, &body.roles)
        .await
    {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_principal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.delete_principal(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn assign_role(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignRoleRequest>,
) -> axum::response::Response {
    let id = match parse_principal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.assign_role(id, &body.role).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn revoke_role(
    Extension(state): Extension<Arc<AppState>>,
    Path((id, role)): Path<(String, String)>,
) -> axum::response::Response {
    let id = match parse_principal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.revoke_role(id, &role).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn enable_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_enabled(&state, &id, true).await
}

pub async fn disable_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_enabled(&state, &id, false).await
}

async fn set_enabled(state: &AppState, raw_id: &str, enabled: bool) -> axum::response::Response {
    let id = match parse_principal_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.set_principal_enabled(id, enabled).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
