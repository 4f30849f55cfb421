//! In-memory storage backend (no persistence)
//!
//! Keeps a bounded history per sensor and per zone behind a lock.
//! It's useful for:
//! - Testing without database dependencies
//! - Deployments where storage is disabled (`"backend": "none"`)
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **Limited capacity**: history is a ring buffer, oldest records are evicted

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use crate::{Alert, SensorReading, ZoneStatus};

/// Maximum readings to keep in memory per sensor
const MAX_READINGS_PER_SENSOR: usize = 1000;

/// Maximum alerts to keep in memory per zone
const MAX_ALERTS_PER_ZONE: usize = 1000;

#[derive(Debug, Default)]
struct MemoryState {
    readings: HashMap<String, VecDeque<SensorReading>>,
    zones: HashMap<String, ZoneStatus>,
    alerts: HashMap<String, VecDeque<Alert>>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, value: T, capacity: usize) {
    if deque.len() >= capacity {
        deque.pop_front();
    }
    deque.push_back(value);
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn save_sensor_reading(&self, reading: &SensorReading) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let history = state.readings.entry(reading.sensor_id.clone()).or_default();
        push_bounded(history, reading.clone(), MAX_READINGS_PER_SENSOR);
        Ok(())
    }

    async fn latest_sensor_reading(&self, sensor_id: &str) -> StorageResult<Option<SensorReading>> {
        let state = self.state.read().await;
        Ok(state
            .readings
            .get(sensor_id)
            .and_then(|history| history.back())
            .cloned())
    }

    async fn reading_history(&self, sensor_id: &str, limit: usize) -> StorageResult<Vec<SensorReading>> {
        let state = self.state.read().await;
        Ok(state
            .readings
            .get(sensor_id)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn sensor_exists(&self, sensor_id: &str, zone_id: &str) -> StorageResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .readings
            .get(sensor_id)
            .is_some_and(|history| history.iter().any(|r| r.zone_id == zone_id)))
    }

    async fn save_zone_status(&self, status: &ZoneStatus) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.zones.insert(status.zone_id.clone(), status.clone());
        Ok(())
    }

    async fn zone_by_id(&self, zone_id: &str) -> StorageResult<Option<ZoneStatus>> {
        let state = self.state.read().await;
        Ok(state.zones.get(zone_id).cloned())
    }

    async fn save_alert(&self, alert: &Alert) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let alerts = state.alerts.entry(alert.zone_id.clone()).or_default();
        push_bounded(alerts, alert.clone(), MAX_ALERTS_PER_ZONE);
        Ok(())
    }

    async fn recent_alerts(&self, zone_id: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        let state = self.state.read().await;
        Ok(state
            .alerts
            .get(zone_id)
            .map(|alerts| alerts.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        debug!("cleanup requested for records before {}", before);

        let mut state = self.state.write().await;
        let mut deleted = 0;

        for history in state.readings.values_mut() {
            let latest = history.pop_back();
            let len = history.len();
            history.retain(|r| r.timestamp >= before);
            deleted += len - history.len();
            if let Some(latest) = latest {
                history.push_back(latest);
            }
        }

        for alerts in state.alerts.values_mut() {
            let len = alerts.len();
            alerts.retain(|a| a.timestamp >= before);
            deleted += len - alerts.len();
        }

        Ok(deleted)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        let readings: usize = state.readings.values().map(VecDeque::len).sum();

        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("sensors".to_string(), state.readings.len().to_string()),
                ("readings".to_string(), readings.to_string()),
                ("zones".to_string(), state.zones.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
