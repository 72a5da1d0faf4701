//! Router configuration for the controller.

use super::customer_ws;
use super::state::AppState;
use crate::state::Controller;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use concourse_web::handlers::{health_check, viewer};
use concourse_web::{AppError, WebResult};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `GET /data`: registry snapshot
/// - `GET /ws_view`: dashboard WebSocket
/// - `GET /ws_customer`: customer WebSocket
/// - `GET /health`: liveness
/// - `GET /metrics`: Prometheus exposition
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(data))
        .route("/ws_view", get(viewer::handle))
        .route("/ws_customer", get(customer_ws::handle))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn data(State(controller): State<Controller>) -> WebResult<Json<Value>> {
    controller
        .snapshot()
        .await
        .map(Json)
        .map_err(|e| AppError::internal("Failed to serialize snapshot").with_source(e.into()))
}

async fn metrics(State(state): State<AppState>) -> WebResult<String> {
    state
        .metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or_else(|| AppError::unavailable("Metrics recorder not installed"))
}
