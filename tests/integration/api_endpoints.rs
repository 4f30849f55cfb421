//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Every entity operation is reachable over REST
//! - Entity errors map to the right status codes
//! - Responses carry the expected JSON shapes

use std::net::SocketAddr;

use axum::http::StatusCode;
use serde_json::{Value, json};
use water_monitoring::{
    api::{ApiState, spawn_api_server},
    config::ApiSection,
    system::WaterSystem,
};

use crate::helpers::*;

async fn spawn_test_api(system: &WaterSystem) -> SocketAddr {
    let state = ApiState::new(system).await;
    let config = ApiSection {
        bind: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}/api/v1{path}")
}

#[tokio::test]
async fn test_health_endpoint() {
    let system = test_system();
    let addr = spawn_test_api(&system).await;

    let response = reqwest::get(url(addr, "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["metadata"]["backend"], "memory");

    system.shutdown().await;
}

#[tokio::test]
async fn test_sensor_lifecycle_over_http() {
    let system = test_system();
    let addr = spawn_test_api(&system).await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(addr, "/sensors/S1/register"))
        .json(&json!({ "location": "Main St", "kind": "flow_meter", "zone_id": "Z1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "created");
    assert_eq!(body["created"], true);

    let response = client
        .post(url(addr, "/sensors/S1/register"))
        .json(&json!({ "location": "Main St", "kind": "flow_meter", "zone_id": "Z1" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "already_exists");

    let response = client
        .put(url(addr, "/sensors/S1/reading"))
        .json(&json!({
            "flow_rate": 80.0,
            "pressure": 12.0,
            "temperature": 15.0,
            "ph": 7.0,
            "turbidity": 0.5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reading: Value = response.json().await.unwrap();
    assert_eq!(reading["pressure"], 12.0);
    assert_eq!(reading["kind"], "flow_meter");

    let response = client
        .get(url(addr, "/sensors/S1/anomalies"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["alert_type"], "low_pressure");
    assert_eq!(body["alerts"][0]["severity"], "critical");

    let response = client
        .post(url(addr, "/sensors/S1/deactivate"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reading: Value = client
        .get(url(addr, "/sensors/S1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reading["active"], false);

    let history: Value = client
        .get(url(addr, "/sensors/S1/history?limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["count"], 3);

    system.shutdown().await;
}

#[tokio::test]
async fn test_error_status_codes() {
    let system = test_system();
    let addr = spawn_test_api(&system).await;
    let client = reqwest::Client::new();

    let response = client.get(url(addr, "/sensors/ghost")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let response = client
        .get(url(addr, "/zones/nowhere/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    client
        .post(url(addr, "/sensors/S1/register"))
        .json(&json!({ "location": "Main St", "kind": "mixed", "zone_id": "Z1" }))
        .send()
        .await
        .unwrap();

    let response = client
        .put(url(addr, "/sensors/S1/reading"))
        .json(&json!({
            "flow_rate": 80.0,
            "pressure": 50.0,
            "temperature": 15.0,
            "ph": 14.5,
            "turbidity": 0.5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    system.shutdown().await;
}

#[tokio::test]
async fn test_zone_and_system_endpoints() {
    let system = test_system();
    let addr = spawn_test_api(&system).await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(addr, "/system/initialize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let zones: Value = client
        .get(url(addr, "/zones"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(zones["count"], 4);

    let overview: Value = client
        .get(url(addr, "/system/overview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["total_zones"], 4.0);
    assert_eq!(overview["total_sensors"], 12.0);

    let status: Value = client
        .get(url(addr, "/zones/zone_industrial/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["name"], "Industrial Zone");

    let response = client
        .post(url(addr, "/zones/zone_industrial/sensors/sensor_extra"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: Value = client
        .post(url(addr, "/zones/zone_industrial/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["active_sensors"].as_array().unwrap().len(), 3);

    let response = client
        .delete(url(addr, "/zones/zone_industrial/sensors/sensor_extra"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let leak: Value = client
        .get(url(addr, "/zones/zone_industrial/leak"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leak["leak_detected"], false);

    for path in ["/alerts/critical", "/leaks", "/zones/zone_industrial/alerts"] {
        let response = client.get(url(addr, path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
    }

    system.shutdown().await;
}
