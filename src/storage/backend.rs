//! Storage backend trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::{Alert, SensorReading, ZoneStatus};

/// Health status of the storage backend
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for durable stores used by the sensor and zone entities
///
/// Implementations must be `Send + Sync` as a single backend is shared by
/// every entity task. Backend-specific failures are converted to
/// `StorageError` variants.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Append a reading to the sensor's history
    ///
    /// The most recently saved reading is what `latest_sensor_reading`
    /// returns, so saving is also how the active flag is persisted.
    async fn save_sensor_reading(&self, reading: &SensorReading) -> StorageResult<()>;

    /// The most recently saved reading of a sensor, if any
    async fn latest_sensor_reading(&self, sensor_id: &str) -> StorageResult<Option<SensorReading>>;

    /// Up to `limit` readings of a sensor, newest first
    async fn reading_history(&self, sensor_id: &str, limit: usize) -> StorageResult<Vec<SensorReading>>;

    /// Whether a reading for this sensor was ever stored under this zone
    async fn sensor_exists(&self, sensor_id: &str, zone_id: &str) -> StorageResult<bool>;

    /// Upsert the status snapshot of a zone
    async fn save_zone_status(&self, status: &ZoneStatus) -> StorageResult<()>;

    async fn zone_by_id(&self, zone_id: &str) -> StorageResult<Option<ZoneStatus>>;

    async fn save_alert(&self, alert: &Alert) -> StorageResult<()>;

    /// Up to `limit` alerts raised in a zone, newest first
    async fn recent_alerts(&self, zone_id: &str, limit: usize) -> StorageResult<Vec<Alert>>;

    /// Delete readings and alerts older than `before`
    ///
    /// The latest reading of every sensor survives so registrations are
    /// never forgotten. Returns the number of records deleted.
    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    /// Lightweight check that the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
