//! End-to-end tests: manager -> zone -> sensor -> store/bus
//!
//! These tests verify that:
//! - Readings flow into zone aggregates and alerts
//! - Alerts reach the bus and the durable store
//! - Entities restore themselves after being stopped

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use water_monitoring::{
    AlertSeverity, AlertType, ReadingUpdate, RegistrationOutcome, SensorKind, ZoneState,
    storage::MemoryBackend,
    system::WaterSystem,
};

use crate::helpers::*;

#[tokio::test]
async fn test_low_pressure_reaches_bus_store_and_manager() {
    let system = test_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    manager
        .register_sensor("S2", "Oak Ave", SensorKind::Pressure, "Z1")
        .await
        .unwrap();
    manager
        .register_zone("Z1", "North", ids(&["S1", "S2"]))
        .await
        .unwrap();

    system.sensor("S1").await.update_reading(measurements(80.0, 15.0)).await.unwrap();
    system.sensor("S2").await.update_reading(measurements(0.0, 25.0)).await.unwrap();

    let mut alert_rx = system.subscribe_alerts();
    let status = system.zone("Z1").await.refresh().await.unwrap();

    assert_eq!(status.status, ZoneState::LowPressure);
    assert_eq!(status.average_pressure, 20.0);
    assert_eq!(status.total_flow_rate, 80.0);
    assert_eq!(status.active_alerts.len(), 2);

    let mut published = vec![];
    while let Ok(alert) = alert_rx.try_recv() {
        published.push(alert);
    }
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|a| a.alert_type == AlertType::LowPressure));

    let critical = manager.get_critical_alerts().await.unwrap();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].sensor_id, "S1");
    assert_eq!(critical[0].severity, AlertSeverity::Critical);

    let stored = system.store().recent_alerts("Z1", 100).await.unwrap();
    assert!(stored.len() >= 2);

    system.shutdown().await;
}

#[tokio::test]
async fn test_overview_after_test_data() {
    let system = test_system();
    let manager = system.manager().await;

    manager.initialize_test_data().await.unwrap();

    let overview = manager.get_system_overview().await.unwrap();
    assert_eq!(overview.total_zones, 4);
    assert_eq!(overview.total_sensors, 12);
    assert_eq!(
        overview.zones_in_normal_status + overview.zones_with_issues,
        overview.total_zones
    );

    let zones = manager.get_all_zones_status().await.unwrap();
    assert_eq!(zones.len(), 4);
    assert!(zones.iter().all(|z| z.status != ZoneState::Maintenance));

    let reading = manager.get_sensor_data("sensor_res_002").await.unwrap();
    assert_eq!(reading.kind, SensorKind::FlowMeter);
    assert_eq!(reading.zone_id, "zone_residential");
    assert_eq!(reading.location, "Residential Sensor 002");

    system.shutdown().await;
}

#[tokio::test]
async fn test_flow_divergence_flags_leak() {
    let system = test_system();
    let manager = system.manager().await;
    manager.initialize_test_data().await.unwrap();

    for (sensor_id, flow) in [
        ("sensor_res_001", 100.0),
        ("sensor_res_002", 100.0),
        ("sensor_res_003", 160.0),
        ("sensor_res_004", 100.0),
    ] {
        system
            .sensor(sensor_id)
            .await
            .update_reading(measurements(flow, 50.0))
            .await
            .unwrap();
    }

    let zone = system.zone("zone_residential").await;
    let status = zone.refresh().await.unwrap();
    assert_eq!(status.status, ZoneState::LeakDetected);
    assert!(status.active_alerts.is_empty());
    assert!(zone.is_leak_detected().await.unwrap());

    let leaks = manager.detected_leaks().await.unwrap();
    assert!(leaks.contains(&"zone_residential".to_string()));

    system.shutdown().await;
}

#[tokio::test]
async fn test_deactivated_sensor_is_excluded_from_aggregates() {
    let system = test_system();
    let manager = system.manager().await;

    for sensor_id in ["S1", "S2"] {
        manager
            .register_sensor(sensor_id, "Main St", SensorKind::Mixed, "Z1")
            .await
            .unwrap();
        system
            .sensor(sensor_id)
            .await
            .update_reading(measurements(100.0, 50.0))
            .await
            .unwrap();
    }
    manager
        .register_zone("Z1", "North", ids(&["S1", "S2"]))
        .await
        .unwrap();

    let s2 = system.sensor("S2").await;
    s2.deactivate().await.unwrap();
    assert!(!s2.is_active().await.unwrap());

    let status = system.zone("Z1").await.refresh().await.unwrap();
    assert_eq!(status.total_flow_rate, 100.0);
    assert_eq!(status.active_sensors, ids(&["S1", "S2"]));
    assert_eq!(status.status, ZoneState::Normal);

    s2.activate().await.unwrap();
    let status = system.zone("Z1").await.refresh().await.unwrap();
    assert_eq!(status.total_flow_rate, 200.0);

    system.shutdown().await;
}

#[tokio::test]
async fn test_zone_without_active_sensors_is_in_maintenance() {
    let system = test_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    manager.register_zone("Z1", "North", ids(&["S1"])).await.unwrap();

    system.sensor("S1").await.deactivate().await.unwrap();
    let status = system.zone("Z1").await.refresh().await.unwrap();

    assert_eq!(status.status, ZoneState::Maintenance);
    assert_eq!(status.total_flow_rate, 0.0);
    assert_eq!(status.water_quality_index, 0.0);
    assert_eq!(status.active_sensors, ids(&["S1"]));

    system.shutdown().await;
}

#[tokio::test]
async fn test_sensor_restores_after_shutdown() {
    let system = test_system();
    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::FlowMeter, "Z1").await.unwrap();

    let update = ReadingUpdate {
        flow_rate: 61.5,
        pressure: 44.0,
        temperature: 12.0,
        ph: 7.1,
        turbidity: 0.9,
    };
    sensor.update_reading(update).await.unwrap();

    sensor.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let restored = system.sensor("S1").await.current_data().await.unwrap();
    assert_eq!(restored.measurements(), update);
    assert_eq!(restored.location, "Main St");

    let again = system
        .sensor("S1")
        .await
        .register("Elsewhere", SensorKind::Quality, "Z9")
        .await
        .unwrap();
    assert_eq!(again, RegistrationOutcome::AlreadyExists);

    system.shutdown().await;
}

#[tokio::test]
async fn test_idle_sensor_is_evicted_and_reactivated() {
    let mut timing = manual_timing();
    timing.sensor_idle_timeout = Some(Duration::from_millis(100));
    let system = WaterSystem::with_services(services_with(Arc::new(MemoryBackend::new()), timing));

    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::Mixed, "Z1").await.unwrap();
    let before = sensor.current_data().await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(system.directory().running_sensors().await, 0);

    let after = system.sensor("S1").await.current_data().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(system.directory().running_sensors().await, 1);

    system.shutdown().await;
}

#[tokio::test]
async fn test_updates_across_idle_eviction_are_never_lost() {
    let mut timing = manual_timing();
    timing.sensor_idle_timeout = Some(Duration::from_millis(40));
    let system = WaterSystem::with_services(services_with(Arc::new(MemoryBackend::new()), timing));

    system
        .sensor("S1")
        .await
        .register("Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();

    for step in 0..8 {
        let pressure = 40.0 + f64::from(step);
        system
            .sensor("S1")
            .await
            .update_reading(measurements(70.0, pressure))
            .await
            .unwrap();

        // alternate between staying under the idle timeout and outlasting it
        let pause = if step % 2 == 0 { 10 } else { 80 };
        tokio::time::sleep(Duration::from_millis(pause)).await;

        let current = system.sensor("S1").await.current_data().await.unwrap();
        assert_eq!(current.pressure, pressure);
        assert!(system.directory().running_sensors().await <= 1);
    }

    system.shutdown().await;
}

#[tokio::test]
async fn test_zone_restores_after_shutdown() {
    let system = test_system();
    let manager = system.manager().await;

    manager
        .register_sensor("S1", "Main St", SensorKind::Mixed, "Z1")
        .await
        .unwrap();
    manager.register_zone("Z1", "North", ids(&["S1"])).await.unwrap();

    system.zone("Z1").await.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = system.zone("Z1").await.get_zone_status().await.unwrap();
    assert_eq!(status.name, "North");
    assert_eq!(status.active_sensors, ids(&["S1"]));

    system.shutdown().await;
}

#[tokio::test]
async fn test_simulate_drifts_within_bounds() {
    let system = test_system();
    let sensor = system.sensor("S1").await;
    sensor.register("Main St", SensorKind::Mixed, "Z1").await.unwrap();
    sensor.update_reading(measurements(80.0, 50.0)).await.unwrap();

    let next = sensor.simulate().await.unwrap();
    assert!((next.flow_rate - 80.0).abs() <= 5.0);
    assert!((next.pressure - 50.0).abs() <= 3.0);
    assert!((next.temperature - 15.0).abs() <= 0.5);
    assert!((next.ph - 7.2).abs() <= 0.1 + 1e-9);

    let history = system.store().reading_history("S1", 10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0], next);

    system.shutdown().await;
}
