//! One HTTP request span per request, whichever service handles it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use be_monolith::{ServerConfig, build_app};
use be_remote_db::MemoryStore;
use tower::ServiceExt;
use tracing::span;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

#[derive(Clone, Default)]
struct RequestSpans(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for RequestSpans {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == "request" {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn each_request_gets_a_single_trace_span() {
    let spans = RequestSpans::default();
    let _guard = tracing::subscriber::set_default(Registry::default().with(spans.clone()));
    tracing::callsite::rebuild_interest_cache();

    let vars = HashMap::from([("JWT_SECRET", "secret")]);
    let config = ServerConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
    let app = build_app(&config, Arc::new(MemoryStore::new())).router;

    for (method, uri, expected) in [
        ("GET", "/health", StatusCode::OK),
        ("POST", "/cards", StatusCode::UNAUTHORIZED),
        ("POST", "/charges", StatusCode::UNAUTHORIZED),
        ("GET", "/transactions/TXN1", StatusCode::UNAUTHORIZED),
    ] {
        let before = spans.0.load(Ordering::SeqCst);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{method} {uri}");
        assert_eq!(spans.0.load(Ordering::SeqCst) - before, 1, "{method} {uri}");
    }
}
