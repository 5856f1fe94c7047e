use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use raxerp_auth::Role;

use crate::app::dto::MessageResponse;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub fn erp_router() -> Router {
    Router::new().route("/erp", get(erp_info))
}

pub fn admin_router() -> Router {
    Router::new().route("/protected-resource", get(protected_resource))
}

/// GET /erp - greeting that reflects the strongest role held.
pub async fn erp_info(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let access = if principal.principal().has_role(&Role::ADMIN) {
        "administrator"
    } else {
        "user"
    };
    Json(MessageResponse::new(format!(
        "Welcome, {}! You have {access} access.",
        principal.email()
    )))
}

pub async fn protected_resource(
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(MessageResponse::new(format!(
        "Hello {}, you have access to the protected resource.",
        principal.email()
    )))
}
