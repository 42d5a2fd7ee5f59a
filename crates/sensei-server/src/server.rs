//! Axum HTTP + WebSocket server assembly.

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use sensei_llm::AnalysisEngine;
use sensei_store::{RateGovernor, SessionStore};

use crate::hub::ConnectionHub;
use crate::{routes, stream, upload};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalysisEngine>,
    pub store: Arc<SessionStore>,
    pub governor: Arc<RateGovernor>,
    pub hub: Arc<ConnectionHub>,
    pub start_time: Instant,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/ws/stream", get(stream::ws_handler))
        .route("/api/insights", get(routes::insights))
        .route("/api/insights/search", get(routes::search))
        .route("/api/recommendations", get(routes::recommendations))
        .route(
            "/api/recommendations/generate",
            post(routes::generate_recommendations),
        )
        .route("/api/quiz/generate", post(routes::generate_quiz))
        .route("/api/summary/{period}", get(routes::summary))
        .route("/api/upload", post(upload::upload))
        .route("/api/rate/status", get(routes::rate_status))
        .route("/api/rate/reset", post(routes::rate_reset))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Handle returned by [`start`]; cancel the token to shut down.
pub struct ServerHandle {
    pub port: u16,
    pub cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Cancel and wait for the listener to wind down.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();

    let cancel = CancellationToken::new();
    let shutdown_token = cancel.clone();

    info!(port, "sensei server started");
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
            .await
            .ok();
    });

    Ok(ServerHandle { port, cancel, task })
}
