//! Helper functions for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use water_monitoring::{
    Alert, ReadingUpdate, SensorReading, ZoneStatus,
    actors::{EntityServices, EntityTiming},
    bus::AlertBus,
    cache::MemoryCache,
    seed::ReadingSeeder,
    storage::{HealthStatus, MemoryBackend, StorageBackend, StorageError, StorageResult},
    system::WaterSystem,
};

/// Timers far enough out that only explicit refreshes run
pub fn manual_timing() -> EntityTiming {
    EntityTiming {
        warmup: Duration::from_secs(3600),
        refresh_interval: Duration::from_secs(3600),
        sensor_timeout: Duration::from_millis(500),
        sensor_idle_timeout: None,
    }
}

pub fn services_with(store: Arc<dyn StorageBackend>, timing: EntityTiming) -> EntityServices {
    EntityServices {
        store,
        cache: Arc::new(MemoryCache::new()),
        bus: AlertBus::new(256),
        seeder: ReadingSeeder::new(Some(42)),
        timing,
    }
}

pub fn test_system() -> WaterSystem {
    WaterSystem::with_services(services_with(Arc::new(MemoryBackend::new()), manual_timing()))
}

pub fn measurements(flow_rate: f64, pressure: f64) -> ReadingUpdate {
    ReadingUpdate {
        flow_rate,
        pressure,
        temperature: 15.0,
        ph: 7.2,
        turbidity: 0.5,
    }
}

pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// In-memory store that can be switched into a failing state
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryBackend,
    failing: AtomicBool,
    /// `save_alert` fails for alerts raised by these sensors
    rejected_alerts: Mutex<HashSet<String>>,
    /// `save_alert` hangs for alerts raised by these sensors
    stalled_alerts: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn reject_alerts_from(&self, sensor_id: &str) {
        self.rejected_alerts.lock().unwrap().insert(sensor_id.to_string());
    }

    pub fn stall_alerts_from(&self, sensor_id: &str) {
        self.stalled_alerts.lock().unwrap().insert(sensor_id.to_string());
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::ConnectionFailed("store is down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyStore {
    async fn save_sensor_reading(&self, reading: &SensorReading) -> StorageResult<()> {
        self.check()?;
        self.inner.save_sensor_reading(reading).await
    }

    async fn latest_sensor_reading(&self, sensor_id: &str) -> StorageResult<Option<SensorReading>> {
        self.check()?;
        self.inner.latest_sensor_reading(sensor_id).await
    }

    async fn reading_history(&self, sensor_id: &str, limit: usize) -> StorageResult<Vec<SensorReading>> {
        self.check()?;
        self.inner.reading_history(sensor_id, limit).await
    }

    async fn sensor_exists(&self, sensor_id: &str, zone_id: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.sensor_exists(sensor_id, zone_id).await
    }

    async fn save_zone_status(&self, status: &ZoneStatus) -> StorageResult<()> {
        self.check()?;
        self.inner.save_zone_status(status).await
    }

    async fn zone_by_id(&self, zone_id: &str) -> StorageResult<Option<ZoneStatus>> {
        self.check()?;
        self.inner.zone_by_id(zone_id).await
    }

    async fn save_alert(&self, alert: &Alert) -> StorageResult<()> {
        self.check()?;
        if self.rejected_alerts.lock().unwrap().contains(&alert.sensor_id) {
            return Err(StorageError::QueryFailed("alert rejected".to_string()));
        }
        let stalled = self.stalled_alerts.lock().unwrap().contains(&alert.sensor_id);
        if stalled {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        self.inner.save_alert(alert).await
    }

    async fn recent_alerts(&self, zone_id: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        self.check()?;
        self.inner.recent_alerts(zone_id, limit).await
    }

    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        self.check()?;
        self.inner.cleanup_before(before).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.check()?;
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}
