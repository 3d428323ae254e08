//! Health check handlers

use crate::AppState;
use axum::{extract::State, response::Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

/// GET /health
pub async fn health_check(State(app_state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptime_secs": app_state.started_at.elapsed().as_secs(),
    }))
}

/// GET /
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "hookrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
