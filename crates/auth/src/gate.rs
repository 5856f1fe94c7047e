//! Request gate: the pipeline stage run before every protected handler.
//!
//! Transport-agnostic. The HTTP layer hands over raw header values through a
//! [`TokenSource`] and maps the [`Rejection`] to a status code.

use std::sync::Arc;

use crate::{AuthError, AuthService, Principal, Requirement};

/// Cookie carrying the session token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Raw request material a token can be extracted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSource<'a> {
    cookies: Vec<&'a str>,
    authorization: Option<&'a str>,
}

impl<'a> TokenSource<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one `Cookie` header value (`name=value; name2=value2`).
    pub fn with_cookie_header(mut self, header: &'a str) -> Self {
        self.cookies.push(header);
        self
    }

    /// Set the `Authorization` header value.
    pub fn with_authorization(mut self, header: &'a str) -> Self {
        self.authorization = Some(header);
        self
    }

    /// The presented token: the `access_token` cookie when present, else a
    /// `Bearer` authorization value. Empty values count as absent.
    pub fn token(&self) -> Option<&'a str> {
        self.cookie_token().or_else(|| self.bearer_token())
    }

    fn cookie_token(&self) -> Option<&'a str> {
        self.cookies
            .iter()
            .copied()
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == ACCESS_TOKEN_COOKIE)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    }

    fn bearer_token(&self) -> Option<&'a str> {
        let (scheme, token) = self.authorization?.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// Terminal outcome of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No token, or the token did not authenticate.
    Unauthorized,
    /// Authenticated, but the requirement was not met.
    Forbidden,
    /// Storage or signing failure. Never reported as forbidden.
    Internal,
}

impl Rejection {
    pub fn status_code(self) -> u16 {
        match self {
            Rejection::Unauthorized => 401,
            Rejection::Forbidden => 403,
            Rejection::Internal => 500,
        }
    }
}

impl From<&AuthError> for Rejection {
    fn from(err: &AuthError) -> Self {
        if err.is_authentication_failure() {
            Rejection::Unauthorized
        } else if err.is_authorization_failure() {
            Rejection::Forbidden
        } else {
            Rejection::Internal
        }
    }
}

/// Where a request stopped in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Unauthenticated,
    TokenExtracted,
    Authenticated,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Unauthenticated => "unauthenticated",
            Stage::TokenExtracted => "token_extracted",
            Stage::Authenticated => "authenticated",
        }
    }
}

/// `Unauthenticated -> TokenExtracted -> Authenticated -> Authorized`, or a
/// [`Rejection`] from any stage. Nothing is cached between requests.
#[derive(Debug, Clone)]
pub struct RequestGate {
    service: Arc<AuthService>,
}

impl RequestGate {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }

    pub async fn admit(
        &self,
        source: &TokenSource<'_>,
        requirement: &Requirement,
    ) -> Result<Principal, Rejection> {
        let Some(token) = source.token() else {
            return Err(reject(Stage::Unauthenticated, Rejection::Unauthorized, None));
        };

        let principal = self
            .service
            .authenticator()
            .authenticate_by_token(token)
            .await
            .map_err(|e| reject(Stage::TokenExtracted, Rejection::from(&e), Some(&e)))?;

        self.service
            .check(&principal, requirement)
            .map_err(|e| reject(Stage::Authenticated, Rejection::from(&e), Some(&e)))?;

        Ok(principal)
    }
}

fn reject(stage: Stage, rejection: Rejection, cause: Option<&AuthError>) -> Rejection {
    match (rejection, cause) {
        (Rejection::Internal, Some(e)) => {
            tracing::error!(stage = stage.as_str(), error = %e, "request gate failed");
        }
        (_, Some(e)) => {
            tracing::debug!(stage = stage.as_str(), reason = %e, ?rejection, "request rejected");
        }
        (_, None) => {
            tracing::debug!(stage = stage.as_str(), ?rejection, "request rejected");
        }
    }
    rejection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialStore, PrincipalDirectory};
    use crate::testing::Fixture;
    use crate::{Permission, Role};

    #[test]
    fn cookie_is_preferred_over_bearer() {
        let source = TokenSource::new()
            .with_cookie_header("theme=dark; access_token=from-cookie")
            .with_authorization("Bearer from-header");
        assert_eq!(source.token(), Some("from-cookie"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let source = TokenSource::new()
            .with_cookie_header("theme=dark")
            .with_authorization("bearer  abc.def.ghi ");
        assert_eq!(source.token(), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_may_arrive_in_any_header() {
        let source = TokenSource::new()
            .with_cookie_header("a=1")
            .with_cookie_header("access_token=\"quoted\"");
        assert_eq!(source.token(), Some("quoted"));
    }

    #[test]
    fn empty_or_foreign_values_are_absent() {
        assert_eq!(TokenSource::new().token(), None);
        assert_eq!(
            TokenSource::new().with_cookie_header("access_token=").token(),
            None
        );
        assert_eq!(
            TokenSource::new().with_authorization("Basic dXNlcjpwdw==").token(),
            None
        );
        assert_eq!(TokenSource::new().with_authorization("Bearer ").token(), None);
        assert_eq!(
            TokenSource::new()
                .with_cookie_header("x_access_token=nope")
                .token(),
            None
        );
    }

    #[test]
    fn empty_cookie_falls_through_to_header() {
        let source = TokenSource::new()
            .with_cookie_header("access_token=")
            .with_authorization("Bearer tok");
        assert_eq!(source.token(), Some("tok"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(Rejection::Unauthorized.status_code(), 401);
        assert_eq!(Rejection::Forbidden.status_code(), 403);
        assert_eq!(Rejection::Internal.status_code(), 500);
        assert_eq!(Rejection::from(&AuthError::storage("down")), Rejection::Internal);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let fx = Fixture::new().await;
        let result = fx.gate().admit(&TokenSource::new(), &Requirement::authenticated()).await;
        assert_eq!(result, Err(Rejection::Unauthorized));
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let fx = Fixture::new().await;
        let source = TokenSource::new().with_authorization("Bearer not-a-token");
        let result = fx.gate().admit(&source, &Requirement::authenticated()).await;
        assert_eq!(result, Err(Rejection::Unauthorized));
    }

    #[tokio::test]
    async fn user_on_admin_endpoint_is_forbidden() {
        let fx = Fixture::new().await;
        let id = fx.principal("user@example.com", &[Role::USER]).await;
        let header = format!("Bearer {}", fx.token_for(id, "user@example.com", vec![Role::USER]));
        let source = TokenSource::new().with_authorization(&header);

        let result = fx.gate().admit(&source, &Requirement::any_role([Role::ADMIN])).await;
        assert_eq!(result, Err(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn admitted_principal_reaches_handler() {
        let fx = Fixture::new().await;
        let id = fx.principal("admin@example.com", &[Role::ADMIN]).await;
        let cookie = format!(
            "access_token={}",
            fx.token_for(id, "admin@example.com", vec![Role::ADMIN])
        );
        let source = TokenSource::new().with_cookie_header(&cookie);

        let principal = fx
            .gate()
            .admit(&source, &Requirement::all_permissions([Permission::DELETE_USER]))
            .await
            .unwrap();
        assert_eq!(principal.id, id);
    }

    #[tokio::test]
    async fn deleted_principal_is_unauthorized() {
        let fx = Fixture::new().await;
        let id = fx.principal("gone@example.com", &[Role::ADMIN]).await;
        let header = format!("Bearer {}", fx.token_for(id, "gone@example.com", vec![Role::ADMIN]));
        fx.store.delete_principal(id).await.unwrap();
        assert_eq!(fx.store.find_by_id(id).await.unwrap(), None);

        let source = TokenSource::new().with_authorization(&header);
        let result = fx.gate().admit(&source, &Requirement::authenticated()).await;
        assert_eq!(result, Err(Rejection::Unauthorized));
    }
}
