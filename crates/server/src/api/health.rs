use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::{AppState, Backends};

#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` with durable storage, `degraded` on in-memory fallbacks.
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub backends: Backends,
    pub config: serde_json::Value,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let durable = state.backends.data == "postgres" && state.sessions().is_durable();
    Json(HealthResponse {
        status: if durable { "healthy" } else { "degraded" },
        service: "KCET College Predictor API",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        backends: state.backends.clone(),
        config: state.config.redacted_summary(),
    })
}
