//! Failure tests for the entity system
//!
//! These tests verify that the system handles failures gracefully:
//! - Operations on unregistered entities
//! - Invalid readings
//! - Durable store outages
//! - Unreachable members during aggregation

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use water_monitoring::{
    EntityError, ReadingUpdate, SensorKind, ZoneState, storage::StorageBackend,
    system::WaterSystem,
};

use crate::helpers::*;

fn flaky_system() -> (WaterSystem, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new());
    let system = WaterSystem::with_services(services_with(store.clone(), manual_timing()));
    (system, store)
}

#[tokio::test]
async fn test_unregistered_sensor_rejects_operations() {
    let system = test_system();
    let sensor = system.sensor("ghost").await;

    assert_matches!(sensor.current_data().await, Err(EntityError::NotRegistered(_)));
    assert_matches!(
        sensor.update_reading(measurements(10.0, 50.0)).await,
        Err(EntityError::NotRegistered(_))
    );
    assert_matches!(sensor.simulate().await, Err(EntityError::NotRegistered(_)));
    assert_matches!(sensor.activate().await, Err(EntityError::NotRegistered(_)));
    assert_matches!(sensor.check_anomalies().await, Err(EntityError::NotRegistered(_)));
    assert!(!sensor.is_active().await.unwrap());

    let manager = system.manager().await;
    assert_matches!(
        manager.get_sensor_data("ghost").await,
        Err(EntityError::NotRegistered(_))
    );

    system.shutdown().await;
}

#[tokio::test]
async fn test_invalid_reading_leaves_state_untouched() {
    let system = test_system();
    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::Mixed, "Z1").await.unwrap();
    let before = sensor.current_data().await.unwrap();

    let invalid = [
        ReadingUpdate { ph: 15.0, ..measurements(50.0, 50.0) },
        ReadingUpdate { flow_rate: -3.0, ..measurements(50.0, 50.0) },
        ReadingUpdate { pressure: f64::NAN, ..measurements(50.0, 50.0) },
    ];
    for update in invalid {
        assert_matches!(
            sensor.update_reading(update).await,
            Err(EntityError::InvalidReading(_))
        );
    }

    assert_eq!(sensor.current_data().await.unwrap(), before);
    let history = system.store().reading_history("S1", 10).await.unwrap();
    assert_eq!(history.len(), 1);

    system.shutdown().await;
}

#[tokio::test]
async fn test_unknown_zone_is_not_found() {
    let system = test_system();
    let zone = system.zone("nowhere").await;

    assert_matches!(zone.get_zone_status().await, Err(EntityError::NotFound(_)));
    assert_matches!(zone.get_active_alerts().await, Err(EntityError::NotFound(_)));
    assert_matches!(zone.refresh().await, Err(EntityError::NotFound(_)));
    assert!(!zone.is_leak_detected().await.unwrap());

    system.shutdown().await;
}

#[tokio::test]
async fn test_unregistered_member_is_skipped() {
    let system = test_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    system.sensor("S1").await.update_reading(measurements(70.0, 55.0)).await.unwrap();
    manager
        .register_zone("Z1", "North", ids(&["S1", "ghost"]))
        .await
        .unwrap();

    let status = system.zone("Z1").await.refresh().await.unwrap();
    assert_eq!(status.total_flow_rate, 70.0);
    assert_eq!(status.average_pressure, 55.0);
    assert_eq!(status.status, ZoneState::Normal);
    assert_eq!(status.active_sensors, ids(&["S1", "ghost"]));

    system.shutdown().await;
}

#[tokio::test]
async fn test_store_outage_is_dependency_unavailable() {
    let (system, store) = flaky_system();
    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::Mixed, "Z1").await.unwrap();
    let before = sensor.current_data().await.unwrap();

    store.set_failing(true);

    assert_matches!(
        sensor.update_reading(measurements(90.0, 40.0)).await,
        Err(EntityError::DependencyUnavailable(_))
    );
    assert_matches!(
        system
            .sensor("S2")
            .await
            .register("Oak Ave", SensorKind::Mixed, "Z1")
            .await,
        Err(EntityError::DependencyUnavailable(_))
    );

    // nothing is committed in memory when the write fails
    assert_eq!(sensor.current_data().await.unwrap(), before);

    store.set_failing(false);
    sensor.update_reading(measurements(90.0, 40.0)).await.unwrap();

    system.shutdown().await;
}

#[tokio::test]
async fn test_sensor_restores_from_cache_when_store_is_down() {
    let (system, store) = flaky_system();
    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::Mixed, "Z1").await.unwrap();
    let expected = sensor.update_reading(measurements(64.0, 48.0)).await.unwrap();

    sensor.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.set_failing(true);

    let restored = system.sensor("S1").await.current_data().await.unwrap();
    assert_eq!(restored, expected);

    system.shutdown().await;
}

#[tokio::test]
async fn test_zone_restores_from_cache_when_store_is_down() {
    let (system, store) = flaky_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    manager.register_zone("Z1", "North", ids(&["S1"])).await.unwrap();
    manager
        .register_sensor("S2", "Oak Ave", SensorKind::Mixed, "Z2")
        .await
        .unwrap();
    manager.register_zone("Z2", "South", ids(&["S2"])).await.unwrap();

    system.zone("Z2").await.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.set_failing(true);

    let mut names: Vec<String> = manager
        .get_all_zones_status()
        .await
        .unwrap()
        .into_iter()
        .map(|status| status.name)
        .collect();
    names.sort();
    assert_eq!(names, ids(&["North", "South"]));

    system.shutdown().await;
}

#[tokio::test]
async fn test_refresh_with_store_down_keeps_in_memory_status() {
    let (system, store) = flaky_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    manager.register_zone("Z1", "North", ids(&["S1"])).await.unwrap();
    system.sensor("S1").await.update_reading(measurements(70.0, 55.0)).await.unwrap();

    store.set_failing(true);

    let zone = system.zone("Z1").await;
    assert_matches!(zone.refresh().await, Err(EntityError::DependencyUnavailable(_)));

    let status = zone.get_zone_status().await.unwrap();
    assert_eq!(status.status, ZoneState::Normal);
    assert_eq!(status.total_flow_rate, 70.0);

    system.shutdown().await;
}

/// S1 raises a low-pressure alert, S2 and S3 are healthy
async fn register_three_sensor_zone(system: &WaterSystem) {
    let manager = system.manager().await;
    for (sensor_id, pressure) in [("S1", 10.0), ("S2", 60.0), ("S3", 50.0)] {
        manager
            .register_sensor(sensor_id, "Main St", SensorKind::Pressure, "Z1")
            .await
            .unwrap();
        system
            .sensor(sensor_id)
            .await
            .update_reading(measurements(40.0, pressure))
            .await
            .unwrap();
    }
    manager.register_zone("Z1", "North", ids(&["S1", "S2", "S3"])).await.unwrap();
}

#[tokio::test]
async fn test_failing_sensor_is_left_out_of_aggregation() {
    let (system, store) = flaky_system();
    store.reject_alerts_from("S1");
    register_three_sensor_zone(&system).await;

    let status = system.zone("Z1").await.refresh().await.unwrap();

    assert_eq!(status.status, ZoneState::Normal);
    assert_eq!(status.total_flow_rate, 80.0);
    assert_eq!(status.average_pressure, 55.0);
    assert!(status.active_alerts.is_empty());
    assert_eq!(status.active_sensors, ids(&["S1", "S2", "S3"]));

    system.shutdown().await;
}

#[tokio::test]
async fn test_unresponsive_sensor_times_out_without_blocking_zone() {
    let (system, store) = flaky_system();
    register_three_sensor_zone(&system).await;
    store.stall_alerts_from("S1");

    let started = std::time::Instant::now();
    let status = system.zone("Z1").await.refresh().await.unwrap();

    // sensor timeout is 500ms, the stalled store call takes 2s
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(status.status, ZoneState::Normal);
    assert_eq!(status.total_flow_rate, 80.0);
    assert_eq!(status.average_pressure, 55.0);

    system.shutdown().await;
}
