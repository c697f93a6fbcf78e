use auth_core::{Claims, Role};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::AuthzError;

/// Claims of the authenticated caller, as stored by [`crate::authenticate`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn user_id(&self) -> Result<Uuid, AuthzError> {
        parse_user_id(&self.claims)
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AuthzError::MissingToken)?;
        Ok(AuthUser { claims })
    }
}

pub fn parse_user_id(claims: &Claims) -> Result<Uuid, AuthzError> {
    Uuid::parse_str(&claims.sub).map_err(|_| AuthzError::InvalidSubject)
}
