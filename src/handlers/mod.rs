pub mod auth;
pub mod goals;
pub mod shared_goals;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 query
    let db_up = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let response = HealthStatus {
        status: if db_up { "ok" } else { "unavailable" }.to_string(),
        timestamp: Utc::now(),
    };

    let status_code = if db_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
