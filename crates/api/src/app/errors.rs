use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use raxerp_auth::{AuthError, Rejection};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 401 with a `WWW-Authenticate: Bearer` challenge. The message never says
/// which check failed.
pub fn unauthorized() -> axum::response::Response {
    let mut resp = json_error(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "could not validate credentials",
    );
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    resp
}

pub fn forbidden() -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient privileges")
}

fn internal() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

pub fn rejection_to_response(rejection: Rejection) -> axum::response::Response {
    match rejection {
        Rejection::Unauthorized => unauthorized(),
        Rejection::Forbidden => forbidden(),
        Rejection::Internal => internal(),
    }
}

/// Map an error from an administrative operation.
///
/// `NotFound` names a missing target here (404). Login maps its own failures
/// to [`unauthorized`] before reaching this.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        AuthError::DuplicateName(name) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("'{name}' already exists"),
        ),
        AuthError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        e if e.is_authentication_failure() => unauthorized(),
        e if e.is_authorization_failure() => forbidden(),
        e => {
            tracing::error!(error = %e, "request failed");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_admin_errors_to_statuses() {
        let cases = [
            (AuthError::NotFound, StatusCode::NOT_FOUND),
            (AuthError::DuplicateName("admin".into()), StatusCode::CONFLICT),
            (AuthError::validation("bad"), StatusCode::BAD_REQUEST),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::MissingPermission, StatusCode::FORBIDDEN),
            (AuthError::storage("down"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let resp = rejection_to_response(Rejection::Unauthorized);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            rejection_to_response(Rejection::Internal).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
