//! Session endpoints: login, logout, whoami.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use raxerp_auth::ACCESS_TOKEN_COOKIE;

use crate::app::{AppState, CookiePolicy, dto, errors};
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/login/token", post(login))
        .route("/logout", post(logout))
}

pub fn session_router() -> Router {
    Router::new().route("/whoami", get(whoami))
}

/// POST /login/token - exchange email + password for a session token.
///
/// Every authentication failure gets the same 401 body, so callers cannot
/// tell an unknown email from a wrong password.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let issued = match state.service.login(&body.email, &body.password).await {
        Ok(issued) => issued,
        Err(e) if e.is_authentication_failure() => return errors::unauthorized(),
        Err(e) => return errors::auth_error_to_response(e),
    };

    let cookie = session_cookie(&issued.access_token, issued.ttl_seconds(), state.cookie);
    let mut resp = (StatusCode::OK, Json(dto::TokenResponse::from(&issued))).into_response();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            resp.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
    }
    resp
}

/// POST /logout - clear the session cookie. Tokens are stateless, so a
/// copied bearer token stays valid until it expires.
pub async fn logout(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    let cookie = session_cookie("", 0, state.cookie);
    let mut resp = StatusCode::NO_CONTENT.into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        resp.headers_mut().insert(header::SET_COOKIE, value);
    }
    resp
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(dto::WhoAmIResponse::from(&principal))
}

fn session_cookie(token: &str, max_age: i64, policy: CookiePolicy) -> String {
    let secure = if policy.secure { "; Secure" } else { "" };
    format!(
        "{ACCESS_TOKEN_COOKIE}={token}; HttpOnly{secure}; SameSite=Lax; Max-Age={max_age}; Path=/"
    )
}
