//! Role and permission catalog management.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use crate::app::{AppState, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:name", delete(delete_role))
        .route("/permissions", get(list_permissions).post(create_permission))
}

/// POST /roles - create a role from existing permissions.
pub async fn create_role(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    match state.service.create_role(&body.name, &body.permissions).await {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET /roles - all roles with their permissions, by name.
pub async fn list_roles(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    match state.service.list_roles().await {
        Ok(roles) => (StatusCode::OK, Json(roles)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn delete_role(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match state.service.delete_role(&name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn create_permission(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::CreatePermissionRequest>,
) -> axum::response::Response {
    match state.service.create_permission(&body.name).await {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn list_permissions(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Response {
    match state.service.list_permissions().await {
        Ok(permissions) => (StatusCode::OK, Json(permissions)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
