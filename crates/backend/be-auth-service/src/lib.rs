//! Account registration, login and token refresh under `/auth`.

use std::sync::Arc;

use axum::{Router, middleware, routing::post};

pub mod config;
pub mod error;
pub mod handlers;
pub mod service;
pub mod types;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::AuthService;

/// Routes relative to the `/auth` mount point.
pub fn create_router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/register/{role}", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh-token", post(handlers::refresh_token))
        .route_layer(middleware::from_fn_with_state(
            service.rate_limit.clone(),
            be_authz::rate_limit,
        ))
        .with_state(service)
}
