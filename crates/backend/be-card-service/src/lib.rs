//! Virtual card issuance, lookup and the per-user spending overview under
//! `/cards`.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};
use be_authz::{Role, authenticate, rate_limit, require_roles};

pub mod analytics;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod service;
pub mod types;

pub use error::CardError;
pub use service::AppState;

/// Routes relative to the `/cards` mount point.
pub fn create_router(state: Arc<AppState>) -> Router {
    let issue = Router::new()
        .route("/", post(handlers::issue_card))
        .route_layer(middleware::from_fn_with_state(
            state.card_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::User], req, next)
        }));

    let fetch = Router::new()
        .route("/{id}", get(handlers::get_card))
        .route_layer(middleware::from_fn_with_state(
            state.card_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::User, Role::Admin], req, next)
        }));

    let analytics = Router::new()
        .route("/analytics/overview", get(handlers::overview))
        .route_layer(middleware::from_fn_with_state(
            state.analytics_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::User], req, next)
        }));

    issue
        .merge(fetch)
        .merge(analytics)
        .route_layer(middleware::from_fn_with_state(
            state.jwt_config.clone(),
            authenticate,
        ))
        .with_state(state)
}
