//! Transaction lookup and merchant/admin analytics under `/transactions`.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::get,
};
use be_authz::{Role, authenticate, rate_limit, require_roles};

pub mod analytics;
pub mod error;
pub mod handlers;
pub mod service;
pub mod types;

pub use error::TransactionError;
pub use service::AppState;

/// Routes relative to the `/transactions` mount point. The general limit
/// covers every route; analytics routes are additionally held to the
/// analytics limit.
pub fn create_router(state: Arc<AppState>) -> Router {
    let merchant_analytics = Router::new()
        .route("/analytics/merchant", get(handlers::merchant_analytics))
        .route_layer(middleware::from_fn_with_state(
            state.analytics_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::Merchant, Role::Admin], req, next)
        }));

    let admin_analytics = Router::new()
        .route("/analytics/admin", get(handlers::admin_analytics))
        .route_layer(middleware::from_fn_with_state(
            state.analytics_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::Admin], req, next)
        }));

    let lookup = Router::new().route("/{transaction_id}", get(handlers::get_transaction));

    lookup
        .merge(merchant_analytics)
        .merge(admin_analytics)
        .route_layer(middleware::from_fn_with_state(
            state.general_rate_limit.clone(),
            rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.jwt_config.clone(),
            authenticate,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{self, StatusCode};
    use be_authz::{JwtConfig, RateLimitPolicy};
    use be_remote_db::{
        ExpiryDate, MemoryStore, NewCard, NewTransaction, NewUser, Store, TransactionStatus, User,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    struct Harness {
        app: Router,
        jwt: Arc<JwtConfig>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new(general: RateLimitPolicy) -> Self {
            let store = Arc::new(MemoryStore::new());
            let jwt = Arc::new(JwtConfig::from_secrets(b"access", b"refresh"));
            let state = AppState::new(store.clone(), jwt.clone())
                .with_rate_limits(general, RateLimitPolicy::ANALYTICS);
            Self {
                app: create_router(Arc::new(state)),
                jwt,
                store,
            }
        }

        async fn user(&self, name: &str, role: Role) -> (User, String) {
            let user = self
                .store
                .create_user(
                    NewUser::builder()
                        .name(name)
                        .email(format!("{}@example.com", name.to_lowercase()))
                        .role(role)
                        .password_hash("hash")
                        .build(),
                )
                .await
                .unwrap();
            let token = self
                .jwt
                .issue_access_token(&user.id.to_string(), &user.email, role)
                .unwrap();
            (user, token)
        }

        async fn charge(&self, id: &str, merchant: &User, customer: &User) {
            let card = self
                .store
                .create_card(
                    NewCard::builder()
                        .user_id(customer.id)
                        .card_number(format!("1000000000{}", id.len()))
                        .card_holder_name(customer.name.clone())
                        .expiry_date(ExpiryDate::years_after(Utc::now(), 1))
                        .cvv("123")
                        .max_limit(dec!(10000))
                        .build(),
                )
                .await
                .unwrap();
            self.store
                .create_transaction(
                    NewTransaction::builder()
                        .transaction_id(id)
                        .amount(dec!(25))
                        .card_id(card.id)
                        .card_number(card.card_number)
                        .card_holder_name(card.card_holder_name)
                        .merchant_id(merchant.id)
                        .merchant_name(merchant.name.clone())
                        .customer_id(customer.id)
                        .customer_name(customer.name.clone())
                        .status(TransactionStatus::Completed)
                        .description("Books")
                        .timestamp(Utc::now())
                        .build(),
                )
                .await
                .unwrap();
        }

        async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
            let response = self
                .app
                .clone()
                .oneshot(
                    http::Request::builder()
                        .uri(uri)
                        .header("authorization", format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn parties_can_read_their_transaction() {
        let h = Harness::new(RateLimitPolicy::GENERAL);
        let (shop, shop_token) = h.user("Shop", Role::Merchant).await;
        let (ada, ada_token) = h.user("Ada", Role::User).await;
        let (_, eve_token) = h.user("Eve", Role::User).await;
        h.charge("TXN1", &shop, &ada).await;

        let (status, body) = h.get("/TXN1", &shop_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["id"], "TXN1");
        assert_eq!(body["transaction"]["customer"]["email"], "ada@example.com");
        assert!(body["transaction"].get("card").is_none());

        let (status, body) = h.get("/TXN1", &ada_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["merchant"]["name"], "Shop");

        let (status, body) = h.get("/TXN1", &eve_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied to this transaction");

        let (status, body) = h.get("/TXN2", &ada_token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Transaction not found");
    }

    #[tokio::test]
    async fn merchant_analytics_for_merchants_and_admins() {
        let h = Harness::new(RateLimitPolicy::GENERAL);
        let (shop, shop_token) = h.user("Shop", Role::Merchant).await;
        let (ada, ada_token) = h.user("Ada", Role::User).await;
        let (_, root_token) = h.user("Root", Role::Admin).await;
        h.charge("TXN1", &shop, &ada).await;

        let (status, body) = h.get("/analytics/merchant", &shop_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overview"]["totalTransactions"], 1);
        assert_eq!(body["customerAnalysis"][0]["customerName"], "Ada");
        assert_eq!(body["recentTransactions"][0]["customerName"], "Ada");

        let (status, body) = h.get("/analytics/merchant", &root_token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Valid merchant ID required for admin");

        let uri = format!("/analytics/merchant?merchantId={}", shop.id);
        let (status, body) = h.get(&uri, &root_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["merchant"]["email"], "shop@example.com");

        assert_eq!(
            h.get("/analytics/merchant", &ada_token).await.0,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn admin_analytics_is_admin_only() {
        let h = Harness::new(RateLimitPolicy::GENERAL);
        let (_, shop_token) = h.user("Shop", Role::Merchant).await;
        let (_, root_token) = h.user("Root", Role::Admin).await;

        assert_eq!(
            h.get("/analytics/admin", &shop_token).await.0,
            StatusCode::FORBIDDEN
        );

        let (status, body) = h.get("/analytics/admin", &root_token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overview"]["totalMerchants"], 1);
        assert_eq!(body["cardAnalysis"]["totalCards"], 0);
    }

    #[tokio::test]
    async fn general_limit_covers_every_route() {
        let h = Harness::new(RateLimitPolicy {
            max_requests: 1,
            ..RateLimitPolicy::GENERAL
        });
        let (_, root_token) = h.user("Root", Role::Admin).await;

        assert_eq!(h.get("/TXN1", &root_token).await.0, StatusCode::NOT_FOUND);
        let (status, body) = h.get("/analytics/admin", &root_token).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], RateLimitPolicy::GENERAL.message);
    }
}
