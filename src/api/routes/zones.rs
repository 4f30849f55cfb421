//! Zone endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    ZoneStatus,
    api::{error::ApiResult, state::ApiState},
};

#[derive(Debug, Deserialize)]
pub struct RegisterZoneRequest {
    pub name: String,
    #[serde(default)]
    pub sensor_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentAlertsQuery {
    limit: Option<usize>,
}

/// POST /api/v1/zones/:id/register
pub async fn register_zone(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
    Json(request): Json<RegisterZoneRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .manager
        .register_zone(&zone_id, request.name, request.sensor_ids)
        .await?;

    Ok(Json(json!({
        "zone_id": zone_id,
        "outcome": outcome,
        "created": outcome.is_created(),
    })))
}

/// GET /api/v1/zones
pub async fn list_zones(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let zones = state.manager.get_all_zones_status().await?;

    Ok(Json(json!({
        "count": zones.len(),
        "zones": zones,
    })))
}

/// GET /api/v1/zones/:id/status
pub async fn get_status(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<ZoneStatus>> {
    let status = state.directory.zone(&zone_id).await.get_zone_status().await?;
    Ok(Json(status))
}

/// GET /api/v1/zones/:id/alerts
pub async fn get_active_alerts(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let alerts = state.directory.zone(&zone_id).await.get_active_alerts().await?;

    Ok(Json(json!({
        "zone_id": zone_id,
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

/// GET /api/v1/zones/:id/alerts/recent
///
/// Alerts from the durable store, newest first
pub async fn get_recent_alerts(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
    Query(query): Query<RecentAlertsQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(100).min(1000);
    let alerts = state.store.recent_alerts(&zone_id, limit).await?;

    Ok(Json(json!({
        "zone_id": zone_id,
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

/// GET /api/v1/zones/:id/leak
pub async fn is_leak_detected(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let leak = state.directory.zone(&zone_id).await.is_leak_detected().await?;
    Ok(Json(json!({ "zone_id": zone_id, "leak_detected": leak })))
}

/// POST /api/v1/zones/:id/sensors/:sensor
pub async fn add_sensor(
    State(state): State<ApiState>,
    Path((zone_id, sensor_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state.directory.zone(&zone_id).await.add_sensor(&sensor_id).await?;
    Ok(Json(json!({ "zone_id": zone_id, "sensor_id": sensor_id, "member": true })))
}

/// DELETE /api/v1/zones/:id/sensors/:sensor
pub async fn remove_sensor(
    State(state): State<ApiState>,
    Path((zone_id, sensor_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state
        .directory
        .zone(&zone_id)
        .await
        .remove_sensor(&sensor_id)
        .await?;
    Ok(Json(json!({ "zone_id": zone_id, "sensor_id": sensor_id, "member": false })))
}

/// POST /api/v1/zones/:id/refresh
pub async fn refresh(
    State(state): State<ApiState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<ZoneStatus>> {
    let status = state.directory.zone(&zone_id).await.refresh().await?;
    Ok(Json(status))
}
