//! Health check endpoint

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState};

/// GET /api/v1/health
///
/// Reports liveness together with the durable store's health
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let storage = state.store.health_check().await?;

    Ok(Json(json!({
        "status": if storage.healthy { "ok" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "storage": storage,
    })))
}
