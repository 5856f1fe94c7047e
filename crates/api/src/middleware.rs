use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use raxerp_auth::{RequestGate, Requirement, TokenSource};

use crate::app::errors;
use crate::context::{PrincipalContext, RequestId};

/// Gate configuration for one group of routes.
#[derive(Debug, Clone)]
pub struct GateState {
    pub gate: RequestGate,
    pub requirement: Arc<Requirement>,
}

impl GateState {
    pub fn new(gate: RequestGate, requirement: Requirement) -> Self {
        Self {
            gate,
            requirement: Arc::new(requirement),
        }
    }
}

/// Authenticate and authorize the request before the handler runs.
///
/// On success the handler sees a [`PrincipalContext`] and the [`RequestId`]
/// in the request extensions; otherwise the request ends here with 401/403.
pub async fn auth_middleware(
    State(state): State<GateState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::new();
    let span = tracing::info_span!(
        "gate",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let (cookies, authorization) = token_headers(req.headers());
    let source = token_source(&cookies, authorization.as_deref());

    let admitted = state
        .gate
        .admit(&source, &state.requirement)
        .instrument(span.clone())
        .await;

    match admitted {
        Ok(principal) => {
            req.extensions_mut().insert(request_id);
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).instrument(span).await
        }
        Err(rejection) => errors::rejection_to_response(rejection),
    }
}

/// Copy out the `Cookie` and `Authorization` header values. Values that are
/// not visible ASCII are ignored.
fn token_headers(headers: &HeaderMap) -> (Vec<String>, Option<String>) {
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_owned)
        .collect();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    (cookies, authorization)
}

fn token_source<'a>(cookies: &'a [String], authorization: Option<&'a str>) -> TokenSource<'a> {
    let source = cookies
        .iter()
        .fold(TokenSource::new(), |source, cookie| source.with_cookie_header(cookie));
    match authorization {
        Some(value) => source.with_authorization(value),
        None => source,
    }
}
