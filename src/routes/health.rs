use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
}

impl HealthData {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Process is up", body = ApiResponse<HealthData>),
    ),
    security(()),
    tag = "Health"
)]
pub async fn health_check() -> Json<ApiResponse<HealthData>> {
    Json(ApiResponse::success(
        "Health check",
        HealthData::new("ok"),
        Some(Meta::empty()),
    ))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Database reachable", body = ApiResponse<HealthData>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthData>),
    ),
    security(()),
    tag = "Health"
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::single("Ready", HealthData::new("ok"))),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::single("Not ready", HealthData::new("unavailable"))),
            )
        }
    }
}
