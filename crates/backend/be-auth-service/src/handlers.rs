use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use be_authz::JsonBody;
use tracing::instrument;

use crate::error::AuthError;
use crate::service::AuthService;
use crate::types::{
    LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequest,
    RegisterResponse,
};

// ---------------------------------------------------------------------------
// POST /auth/register/{role}
// ---------------------------------------------------------------------------

#[instrument(skip(service, body))]
pub async fn register(
    State(service): State<Arc<AuthService>>,
    Path(role): Path<String>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let user = service.register(&role, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: user.into(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /auth/login
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn login(
    State(service): State<Arc<AuthService>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let (user, tokens) = service.login(body).await?;
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: user.into(),
    }))
}

// ---------------------------------------------------------------------------
// POST /auth/refresh-token
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn refresh_token(
    State(service): State<Arc<AuthService>>,
    JsonBody(body): JsonBody<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>, AuthError> {
    if body.refresh_token.is_empty() {
        return Err(AuthError::InvalidInput("Refresh token is required"));
    }
    let token = service.refresh(&body.refresh_token).await?;
    Ok(Json(RefreshTokenResponse {
        message: "Token refreshed successfully".to_string(),
        token,
    }))
}
