//! System-wide endpoints served by the manager

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState};

/// GET /api/v1/system/overview
pub async fn get_overview(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let overview = state.manager.get_system_overview().await?;
    Ok(Json(json!(overview.to_map())))
}

/// GET /api/v1/alerts/critical
pub async fn get_critical_alerts(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let alerts = state.manager.get_critical_alerts().await?;

    Ok(Json(json!({
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

/// GET /api/v1/leaks
pub async fn get_leaks(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let zones = state.manager.detected_leaks().await?;

    Ok(Json(json!({
        "count": zones.len(),
        "zones": zones,
    })))
}

/// POST /api/v1/system/initialize
///
/// Re-registers the built-in demo zones and sensors
pub async fn initialize(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    state.manager.initialize_test_data().await?;
    Ok(Json(json!({ "initialized": true })))
}
