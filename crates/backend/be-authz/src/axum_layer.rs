use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use be_auth_core::{Claims, JwtConfig, Role};
use tracing::{debug, warn};

use crate::AuthzError;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer access token and stores its [`Claims`] in the
/// request extensions.
pub async fn authenticate(
    State(jwt_config): State<Arc<JwtConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        debug!(path = %req.uri().path(), "Request without bearer token");
        return AuthzError::MissingToken.into_response();
    };

    let claims = match jwt_config.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(path = %req.uri().path(), error = %e, "Rejected access token");
            return AuthzError::InvalidToken(e).into_response();
        }
    };

    debug!(sub = %claims.sub, role = %claims.role, "Authenticated request");
    req.extensions_mut().insert(claims);
    next.run(req).await
}

/// Rejects requests whose authenticated role is not in `allowed`. Must run
/// after [`authenticate`].
///
/// ```ignore
/// router.route_layer(middleware::from_fn(|req: Request, next: Next| {
///     require_roles(&[Role::Merchant], req, next)
/// }))
/// ```
pub async fn require_roles(allowed: &'static [Role], req: Request, next: Next) -> Response {
    let Some(claims) = req.extensions().get::<Claims>() else {
        return AuthzError::MissingToken.into_response();
    };

    if !claims.role.is_any_of(allowed) {
        warn!(
            sub = %claims.sub,
            role = %claims.role,
            path = %req.uri().path(),
            "Role not permitted for route"
        );
        return AuthzError::Forbidden.into_response();
    }

    next.run(req).await
}
