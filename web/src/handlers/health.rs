//! Liveness endpoint.

use axum::http::StatusCode;

/// Simple liveness check.
///
/// Returns 200 OK while the process is serving HTTP. It does not check the bus
/// connection.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
