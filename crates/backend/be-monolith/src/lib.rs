//! Assembles every service router into the GhostCard HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::DefaultBodyLimit, http::StatusCode, routing::get};
use be_auth_service::AuthService;
use be_authz::RateLimit;
use be_remote_db::{DatabaseManager, DbResult, MemoryStore, SharedStore};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;

pub use config::{ConfigError, CorsOrigins, ServerConfig};

pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// The assembled router and every rate limiter its routes check.
pub struct App {
    pub router: Router,
    pub rate_limits: Vec<RateLimit>,
}

fn build_cors(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::permissive(),
        CorsOrigins::List(allowed) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed.iter().cloned()))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
    }
}

async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to GhostCard API" }))
}

/// Opens Postgres when a database URL is configured, otherwise an empty
/// in-memory store.
pub async fn open_store(config: &ServerConfig) -> DbResult<SharedStore> {
    match &config.database_url {
        Some(url) => Ok(Arc::new(DatabaseManager::new(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn build_app(config: &ServerConfig, store: SharedStore) -> App {
    let jwt_config = Arc::new(config.jwt_config());

    let auth = AuthService::new(store.clone(), jwt_config.clone(), config.auth.clone());
    let cards = be_card_service::AppState::new(store.clone(), jwt_config.clone());
    let charges =
        be_charge_service::AppState::new(store.clone(), jwt_config.clone(), config.charge_policy);
    let transactions = be_transaction_service::AppState::new(store, jwt_config);

    let rate_limits = vec![
        auth.rate_limit().clone(),
        cards.card_rate_limit.clone(),
        cards.analytics_rate_limit.clone(),
        charges.charge_rate_limit.clone(),
        transactions.general_rate_limit.clone(),
        transactions.analytics_rate_limit.clone(),
    ];

    let router = Router::new()
        .route("/", get(welcome))
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/auth", be_auth_service::create_router(Arc::new(auth)))
        .nest("/cards", be_card_service::create_router(Arc::new(cards)))
        .nest("/charges", be_charge_service::create_router(Arc::new(charges)))
        .nest(
            "/transactions",
            be_transaction_service::create_router(Arc::new(transactions)),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(build_cors(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    App {
        router,
        rate_limits,
    }
}

/// Periodically drops idle clients from every limiter until `shutdown`
/// fires.
pub fn spawn_rate_limit_pruner(
    rate_limits: Vec<RateLimit>,
    every: Duration,
    mut shutdown: watch::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for limit in &rate_limits {
                        limit.retain_recent();
                    }
                    let tracked: usize = rate_limits.iter().map(RateLimit::tracked_clients).sum();
                    tracing::debug!(tracked, "Pruned idle rate limit entries");
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Serves the API until `shutdown` receives a value.
pub async fn run_server(
    config: ServerConfig,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = open_store(&config).await?;
    let App {
        router,
        rate_limits,
    } = build_app(&config, store);
    let pruner =
        spawn_rate_limit_pruner(rate_limits, RATE_LIMIT_PRUNE_INTERVAL, shutdown.clone());

    tracing::info!(
        addr = %config.http_addr,
        charge_policy = %config.charge_policy,
        "Starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await;

    pruner.abort();
    served?;
    Ok(())
}
