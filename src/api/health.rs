//! Health check endpoint
//!
//! GET /api/v1/health reports liveness, database reachability and whether
//! the schema is current. It always answers 200 so load balancers can tell
//! a degraded backend from a dead one.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::db::migrations;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    pub schema_up_to_date: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.pool.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {:#}", e);
            "unreachable"
        }
    };

    let schema_up_to_date = migrations::is_up_to_date(&state.pool)
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: if database == "connected" { "OK" } else { "DEGRADED" },
        message: "Office Hours Scheduling API",
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        schema_up_to_date,
    })
}
