//! HTTP server setup and shared state.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, stats};
use crate::config::Config;
use crate::router::Router as TaskRouter;
use crate::usage::UsageSink;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<TaskRouter>,
    pub usage: Arc<dyn UsageSink>,
    pub config: Arc<Config>,
    /// Present when the usage audit log is backed by SQLite.
    pub read_db: Option<SqlitePool>,
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let max_concurrent = state.config.server.max_concurrent_requests;

    Router::new()
        .route("/v1/route", post(handlers::select_route))
        .route("/v1/invoke", post(handlers::invoke_task))
        .route("/v1/routes", get(handlers::list_routes))
        .route("/v1/credits/estimate", post(handlers::estimate_credits))
        .route("/v1/credits/rates", get(handlers::list_rates))
        .route("/v1/usage/stats", get(stats::stats_handler))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process exits.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting idealab router");

    axum::serve(listener, app).await?;

    Ok(())
}
