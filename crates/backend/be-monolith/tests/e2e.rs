//! Drives the assembled API against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use be_monolith::{ServerConfig, build_app};
use be_remote_db::MemoryStore;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Api {
    app: Router,
}

impl Api {
    fn new(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("JWT_SECRET".to_string(), "e2e-secret".to_string()),
            ("ALLOW_ADMIN_REGISTRATION".to_string(), "true".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = ServerConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        Self {
            app: build_app(&config, Arc::new(MemoryStore::new())).router,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Registers and logs in, returning the access token.
    async fn account(&self, role: &str, name: &str) -> String {
        let email = format!("{}@example.com", name.to_lowercase());
        let (status, _) = self
            .send(
                "POST",
                &format!("/auth/register/{role}"),
                None,
                Some(json!({ "name": name, "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(&email).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn login(&self, email: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn issue_card(&self, token: &str) -> Value {
        let (status, body) = self.send("POST", "/cards", Some(token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["card"].clone()
    }

    async fn charge(
        &self,
        token: &str,
        card: &Value,
        cvv: &str,
        amount: f64,
    ) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/charges",
            Some(token),
            Some(json!({
                "cardNumber": card["cardNumber"],
                "cvv": cvv,
                "expiryDate": card["expiryDate"],
                "amount": amount,
                "description": "Groceries",
            })),
        )
        .await
    }
}

#[tokio::test]
async fn welcome_and_health_are_public() {
    let api = Api::new(&[]);
    let (status, body) = api.send("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to GhostCard API");
    assert_eq!(api.send("GET", "/health", None, None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn charge_flow_raises_outstanding_balance() {
    let api = Api::new(&[]);
    let user = api.account("user", "Ada").await;
    let card = api.issue_card(&user).await;
    let merchant = api.account("merchant", "Shop").await;

    let cvv = card["cvv"].as_str().unwrap().to_string();
    let (status, body) = api.charge(&merchant, &card, &cvv, 25.5).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transaction"]["status"], "completed");
    let transaction_id = body["transaction"]["id"].as_str().unwrap().to_string();
    assert!(transaction_id.starts_with("TXN"));

    let profile = api.login("ada@example.com").await;
    assert_eq!(profile["user"]["outstandingAmount"].as_f64(), Some(25.5));

    let (status, body) = api
        .send("GET", &format!("/transactions/{transaction_id}"), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["merchant"]["name"], "Shop");

    let card_uri = format!("/cards/{}", card["id"].as_str().unwrap());
    let (status, body) = api.send("GET", &card_uri, Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card"]["isUsed"], true);
    assert!(body["card"].get("cvv").is_none());

    // Single-use cards cannot be charged twice.
    let (status, _) = api.charge(&merchant, &card, &cvv, 1.0).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_cvv_changes_nothing() {
    let api = Api::new(&[]);
    let user = api.account("user", "Ada").await;
    let card = api.issue_card(&user).await;
    let merchant = api.account("merchant", "Shop").await;

    let wrong = if card["cvv"] == "999" { "998" } else { "999" };
    let (status, body) = api.charge(&merchant, &card, wrong, 10.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid CVV");

    let profile = api.login("ada@example.com").await;
    assert_eq!(profile["user"]["outstandingAmount"].as_f64(), Some(0.0));

    let (status, body) = api
        .send("GET", "/transactions/analytics/merchant", Some(&merchant), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["totalTransactions"], 0);
}

#[tokio::test]
async fn reusable_policy_accumulates_on_one_card() {
    let api = Api::new(&[("CHARGE_POLICY", "reusable")]);
    let user = api.account("user", "Ada").await;
    let card = api.issue_card(&user).await;
    let merchant = api.account("merchant", "Shop").await;
    let cvv = card["cvv"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, body) = api.charge(&merchant, &card, &cvv, 10.0).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let profile = api.login("ada@example.com").await;
    assert_eq!(profile["user"]["outstandingAmount"].as_f64(), Some(20.0));
}

#[tokio::test]
async fn roles_are_enforced() {
    let api = Api::new(&[]);
    let user = api.account("user", "Ada").await;
    let merchant = api.account("merchant", "Shop").await;
    let admin = api.account("admin", "Root").await;
    let card = api.issue_card(&user).await;

    assert_eq!(
        api.send("POST", "/cards", Some(&merchant), None).await.0,
        StatusCode::FORBIDDEN
    );
    let cvv = card["cvv"].as_str().unwrap().to_string();
    assert_eq!(
        api.charge(&user, &card, &cvv, 1.0).await.0,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        api.send("GET", "/transactions/analytics/admin", Some(&merchant), None)
            .await
            .0,
        StatusCode::FORBIDDEN
    );

    let (status, body) = api
        .send("GET", "/transactions/analytics/admin", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["totalUsers"], 1);
    assert_eq!(body["cardAnalysis"]["totalCards"], 1);
}

#[tokio::test]
async fn missing_or_invalid_tokens_are_unauthorized() {
    let api = Api::new(&[]);
    assert_eq!(
        api.send("POST", "/cards", None, None).await.0,
        StatusCode::UNAUTHORIZED
    );
    let (status, body) = api
        .send("GET", "/transactions/analytics/admin", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn admin_registration_can_be_disabled() {
    let api = Api::new(&[("ALLOW_ADMIN_REGISTRATION", "false")]);
    let (status, body) = api
        .send(
            "POST",
            "/auth/register/admin",
            None,
            Some(json!({ "name": "Root", "email": "root@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin registration is disabled");
}

#[tokio::test]
async fn auth_rate_limit_returns_retry_after() {
    let api = Api::new(&[]);
    let credentials = json!({ "email": "nobody@example.com", "password": "password123" });

    for _ in 0..10 {
        let (status, _) = api
            .send("POST", "/auth/login", None, Some(credentials.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = api
        .send("POST", "/auth/login", None, Some(credentials))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["retryAfter"].as_u64().is_some());
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let api = Api::new(&[]);
    let padding = "x".repeat(be_monolith::BODY_LIMIT_BYTES + 1);
    let (status, _) = api
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": padding, "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
