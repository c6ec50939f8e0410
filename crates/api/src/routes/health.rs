//! Health check endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub code: &'static str,
    pub message: &'static str,
}

/// GET /health: returns service health status.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        code: "01",
        message: "OK",
    })
}
