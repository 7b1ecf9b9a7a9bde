//! Service health endpoint.

use axum::Json;

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy")),
    tag = "health"
)]
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "services": {
            "store": "up",
            "executor": "up"
        },
        "version": env!("CARGO_PKG_VERSION")
    }))
}
