use axum::{Router, middleware::from_fn_with_state};

use raxerp_auth::{Permission, RequestGate, Requirement, Role};

use crate::app::AppState;
use crate::middleware::{GateState, auth_middleware};

pub mod auth;
pub mod rbac;
pub mod system;
pub mod users;

/// Router for everything under `/api/v1`.
///
/// Each group is guarded by exactly one [`Requirement`]; the gate runs only
/// for routes that matched.
pub fn router(state: &AppState) -> Router {
    let gate = RequestGate::new(state.service.clone());
    let guarded = |routes: Router, requirement: Requirement| {
        routes.route_layer(from_fn_with_state(
            GateState::new(gate.clone(), requirement),
            auth_middleware,
        ))
    };

    let admin_only = Router::new()
        .merge(system::admin_router())
        .merge(users::admin_router())
        .merge(rbac::router());

    Router::new()
        .merge(auth::public_router())
        .merge(guarded(auth::session_router(), Requirement::authenticated()))
        .merge(guarded(
            system::erp_router(),
            Requirement::any_role([Role::ADMIN, Role::USER]),
        ))
        .merge(guarded(admin_only, Requirement::any_role([Role::ADMIN])))
        .merge(guarded(
            users::register_router(),
            Requirement::all_permissions([Permission::CREATE_USER]),
        ))
        .merge(guarded(
            users::delete_router(),
            Requirement::all_permissions([Permission::DELETE_USER]),
        ))
}
