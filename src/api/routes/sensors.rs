//! Sensor endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    ReadingUpdate, SensorKind, SensorReading,
    api::{error::ApiResult, state::ApiState},
};

#[derive(Debug, Deserialize)]
pub struct RegisterSensorRequest {
    pub location: String,
    pub kind: SensorKind,
    pub zone_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

/// POST /api/v1/sensors/:id/register
pub async fn register_sensor(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
    Json(request): Json<RegisterSensorRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .manager
        .register_sensor(&sensor_id, request.location, request.kind, request.zone_id)
        .await?;

    Ok(Json(json!({
        "sensor_id": sensor_id,
        "outcome": outcome,
        "created": outcome.is_created(),
    })))
}

/// GET /api/v1/sensors/:id
pub async fn get_sensor(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<SensorReading>> {
    let reading = state.directory.sensor(&sensor_id).await.current_data().await?;
    Ok(Json(reading))
}

/// PUT /api/v1/sensors/:id/reading
pub async fn update_reading(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
    Json(update): Json<ReadingUpdate>,
) -> ApiResult<Json<SensorReading>> {
    let reading = state
        .directory
        .sensor(&sensor_id)
        .await
        .update_reading(update)
        .await?;
    Ok(Json(reading))
}

/// POST /api/v1/sensors/:id/simulate
pub async fn simulate(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<SensorReading>> {
    let reading = state.directory.sensor(&sensor_id).await.simulate().await?;
    Ok(Json(reading))
}

/// POST /api/v1/sensors/:id/activate
pub async fn activate(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.directory.sensor(&sensor_id).await.activate().await?;
    Ok(Json(json!({ "sensor_id": sensor_id, "active": true })))
}

/// POST /api/v1/sensors/:id/deactivate
pub async fn deactivate(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.directory.sensor(&sensor_id).await.deactivate().await?;
    Ok(Json(json!({ "sensor_id": sensor_id, "active": false })))
}

/// GET /api/v1/sensors/:id/anomalies
///
/// Evaluates the current reading; every alert raised is also persisted
pub async fn check_anomalies(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let alerts = state
        .directory
        .sensor(&sensor_id)
        .await
        .check_anomalies()
        .await?;

    Ok(Json(json!({
        "sensor_id": sensor_id,
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

/// GET /api/v1/sensors/:id/history
///
/// The N most recent stored readings, newest first
pub async fn get_history(
    State(state): State<ApiState>,
    Path(sensor_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(100).min(1000);
    let readings = state.store.reading_history(&sensor_id, limit).await?;

    Ok(Json(json!({
        "sensor_id": sensor_id,
        "count": readings.len(),
        "readings": readings,
    })))
}
