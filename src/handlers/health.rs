use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::db::introspection;
use crate::router::ProxyState;
use crate::types::envelope::{DatabaseStatus, HealthReport};

/// `GET /health`: a round trip through the shared pool.
pub async fn health_check(State(state): State<ProxyState>) -> Response {
    match introspection::server_clock(&state.pool).await {
        Ok(clock) => Json(HealthReport {
            success: true,
            status: "healthy",
            timestamp: Utc::now().to_rfc3339(),
            database: DatabaseStatus {
                connected: true,
                server_time: clock.server_time,
                version: clock.version,
            },
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "unhealthy",
                    "error": "Database connection failed",
                })),
            )
                .into_response()
        }
    }
}
