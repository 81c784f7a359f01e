//! API router configuration.

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    dashboard_page, health, login, login_page, logout, logs, run_command, status,
};
use super::middleware::{require_csrf, require_session};
use super::state::AppState;
use super::webhook::telegram_webhook;
use crate::error::RemoError;

/// Create the router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    // Layers run outermost-last: the session check wraps the CSRF check.
    let protected = Router::new()
        .route("/dashboard", get(dashboard_page))
        .route("/api/status", get(status))
        .route("/api/logs", get(logs))
        .route("/api/commands/{command}", post(run_command))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_csrf))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health))
        .route("/", get(login_page))
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .route("/webhook/{secret}", post(telegram_webhook))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
        }
    }
}

/// Start the server. Peer addresses are made available to handlers for
/// login throttling.
pub async fn serve(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router(state);

    tracing::info!("Starting remo server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| RemoError::Server(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
