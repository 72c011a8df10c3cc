//! HTTP front-end for a collector hosted in its own process.
//!
//! # Architecture
//!
//! ```text
//! Producer ──→ POST /message ──→ CollectorHandle ──→ QueueStore ──→ FileStore
//!                                                         ↑
//!           queue count|flush|clear ──────────────────────┘
//! ```

use crate::bridge::protocol::Response;
use crate::collector::service::CollectorHandle;
use crate::error::ValidationError;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /message
///
/// Protocol errors are answered with `200` and an `ok: false` body; only a
/// collector that is no longer running yields an HTTP error.
async fn message(
    State(collector): State<CollectorHandle>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Request body is not JSON");
            return Ok(Json(Response::invalid(&ValidationError::InvalidMessage).to_value()));
        }
    };

    collector.request(message).await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Collector unavailable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Response::failure(e.to_string()).to_value()),
        )
    })
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    collector: CollectorHandle,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(collector);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Collector listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Collector shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
