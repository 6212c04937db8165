use axum::{http::StatusCode, routing::get, Router};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::storage::EventSource;

/// Source of the current instant; decides which UTC date is "today".
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn EventSource>,
    pub excluded_users: Arc<BTreeSet<String>>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(source: Arc<dyn EventSource>, excluded_users: BTreeSet<String>) -> Self {
        Self {
            source,
            excluded_users: Arc::new(excluded_users),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(handlers::health::health_check))
        // Metrics
        .route(
            "/api/metrics/login-summary",
            get(handlers::metrics::login_summary),
        );

    api.fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(port: u16, state: AppState) -> std::io::Result<()> {
    tracing::info!(
        source = state.source.name(),
        excluded_users = state.excluded_users.len(),
        "event source ready"
    );

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("logindash listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
