//! Merchant charges against virtual cards under `/charges`.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::post,
};
use be_authz::{Role, authenticate, rate_limit, require_roles};

pub mod error;
pub mod handlers;
pub mod policy;
pub mod saga;
pub mod service;
pub mod types;
pub mod validation;

pub use error::ChargeError;
pub use policy::{ChargePolicy, UnknownChargePolicy};
pub use saga::{ChargeSaga, SagaState, SagaStep};
pub use service::AppState;

/// Routes relative to the `/charges` mount point.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_charge))
        .route_layer(middleware::from_fn_with_state(
            state.charge_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::Merchant], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(
            state.jwt_config.clone(),
            authenticate,
        ))
        .with_state(state)
}
