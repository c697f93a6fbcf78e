use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_authz::{ErrorBody, TokenError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    // 400
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("{0}")]
    InvalidInput(&'static str),

    // 401
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    // 403
    #[error("Admin registration is disabled")]
    AdminRegistrationDisabled,
    #[error("Account is inactive")]
    AccountInactive,

    // 409
    #[error("Email already registered")]
    EmailExists,

    // 500
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Token generation failed: {0}")]
    Token(#[from] TokenError),
    #[error("Database error: {0}")]
    Database(#[from] be_remote_db::DbError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidRole(_) | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::InvalidRefreshToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AdminRegistrationDisabled | AuthError::AccountInactive => {
                StatusCode::FORBIDDEN
            }
            AuthError::EmailExists => StatusCode::CONFLICT,
            AuthError::PasswordHash(_) | AuthError::Token(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!(error = %self, "Auth service error");
            ErrorBody::new("Internal server error")
        } else {
            ErrorBody::new(self.to_string())
        };
        body.into_response_with(status)
    }
}
