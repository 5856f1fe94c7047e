//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP routes + handlers, grouped by the requirement that
//!   guards them
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use raxerp_auth::AuthService;

pub mod dto;
pub mod errors;
pub mod routes;

/// Attributes of the session cookie set on login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self { secure: true }
    }
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<AuthService>,
    pub cookie: CookiePolicy,
}

impl AppState {
    pub fn new(service: Arc<AuthService>, cookie: CookiePolicy) -> Self {
        Self { service, cookie }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    let api = routes::router(&state);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", api)
        .layer(Extension(Arc::new(state)))
        .layer(ServiceBuilder::new())
}
