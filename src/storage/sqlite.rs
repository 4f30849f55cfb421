//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: no separate database server required
//! - **WAL mode**: better concurrency for reads during writes
//! - **Connection pooling**: entities share one pool
//! - **Migrations**: automatic schema versioning with sqlx
//!
//! Enum columns are stored as their snake_case serde names, timestamps as
//! Unix milliseconds and zone membership/alerts as JSON text.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::{Alert, SensorReading, ZoneStatus};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn reading_from_row(row: &SqliteRow) -> StorageResult<SensorReading> {
        Ok(SensorReading {
            sensor_id: row.try_get("sensor_id")?,
            zone_id: row.try_get("zone_id")?,
            location: row.try_get("location")?,
            kind: enum_from_text(row.try_get("kind")?)?,
            flow_rate: row.try_get("flow_rate")?,
            pressure: row.try_get("pressure")?,
            temperature: row.try_get("temperature")?,
            ph: row.try_get("ph")?,
            turbidity: row.try_get("turbidity")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
            active: row.try_get("active")?,
        })
    }

    fn alert_from_row(row: &SqliteRow) -> StorageResult<Alert> {
        let alert_id: String = row.try_get("alert_id")?;
        Ok(Alert {
            alert_id: Uuid::parse_str(&alert_id)
                .map_err(|e| StorageError::SerializationError(format!("alert id: {e}")))?,
            alert_type: enum_from_text(row.try_get("alert_type")?)?,
            severity: enum_from_text(row.try_get("severity")?)?,
            sensor_id: row.try_get("sensor_id")?,
            zone_id: row.try_get("zone_id")?,
            message: row.try_get("message")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
        })
    }

    fn zone_from_row(row: &SqliteRow) -> StorageResult<ZoneStatus> {
        let active_sensors: String = row.try_get("active_sensors")?;
        let active_alerts: String = row.try_get("active_alerts")?;
        Ok(ZoneStatus {
            zone_id: row.try_get("zone_id")?,
            name: row.try_get("name")?,
            active_sensors: serde_json::from_str(&active_sensors)?,
            active_alerts: serde_json::from_str(&active_alerts)?,
            total_flow_rate: row.try_get("total_flow_rate")?,
            average_pressure: row.try_get("average_pressure")?,
            water_quality_index: row.try_get("water_quality_index")?,
            status: enum_from_text(row.try_get("status")?)?,
            last_update: Self::millis_to_timestamp(row.try_get("last_update")?),
        })
    }
}

/// Store a unit enum under its serde name
fn enum_to_text<T: Serialize>(value: &T) -> StorageResult<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(text) => Ok(text),
        other => Err(StorageError::SerializationError(format!(
            "expected a string variant, got {other}"
        ))),
    }
}

fn enum_from_text<T: DeserializeOwned>(text: String) -> StorageResult<T> {
    Ok(serde_json::from_value(serde_json::Value::String(text))?)
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, reading), fields(sensor_id = %reading.sensor_id))]
    async fn save_sensor_reading(&self, reading: &SensorReading) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_readings (
                sensor_id, zone_id, location, kind,
                flow_rate, pressure, temperature, ph, turbidity,
                active, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reading.sensor_id)
        .bind(&reading.zone_id)
        .bind(&reading.location)
        .bind(enum_to_text(&reading.kind)?)
        .bind(reading.flow_rate)
        .bind(reading.pressure)
        .bind(reading.temperature)
        .bind(reading.ph)
        .bind(reading.turbidity)
        .bind(reading.active)
        .bind(Self::timestamp_to_millis(&reading.timestamp))
        .execute(&self.pool)
        .await?;

        debug!("stored reading");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_sensor_reading(&self, sensor_id: &str) -> StorageResult<Option<SensorReading>> {
        let row = sqlx::query(
            r#"
            SELECT sensor_id, zone_id, location, kind,
                   flow_rate, pressure, temperature, ph, turbidity,
                   active, timestamp
            FROM sensor_readings
            WHERE sensor_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::reading_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn reading_history(&self, sensor_id: &str, limit: usize) -> StorageResult<Vec<SensorReading>> {
        let rows = sqlx::query(
            r#"
            SELECT sensor_id, zone_id, location, kind,
                   flow_rate, pressure, temperature, ph, turbidity,
                   active, timestamp
            FROM sensor_readings
            WHERE sensor_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(sensor_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let readings = rows
            .iter()
            .map(Self::reading_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("query returned {} readings", readings.len());
        Ok(readings)
    }

    #[instrument(skip(self))]
    async fn sensor_exists(&self, sensor_id: &str, zone_id: &str) -> StorageResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM sensor_readings WHERE sensor_id = ? AND zone_id = ?)",
        )
        .bind(sensor_id)
        .bind(zone_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0 != 0)
    }

    #[instrument(skip(self, status), fields(zone_id = %status.zone_id))]
    async fn save_zone_status(&self, status: &ZoneStatus) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO zone_status (
                zone_id, name, status, active_sensors, active_alerts,
                total_flow_rate, average_pressure, water_quality_index, last_update
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (zone_id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                active_sensors = excluded.active_sensors,
                active_alerts = excluded.active_alerts,
                total_flow_rate = excluded.total_flow_rate,
                average_pressure = excluded.average_pressure,
                water_quality_index = excluded.water_quality_index,
                last_update = excluded.last_update
            "#,
        )
        .bind(&status.zone_id)
        .bind(&status.name)
        .bind(enum_to_text(&status.status)?)
        .bind(serde_json::to_string(&status.active_sensors)?)
        .bind(serde_json::to_string(&status.active_alerts)?)
        .bind(status.total_flow_rate)
        .bind(status.average_pressure)
        .bind(status.water_quality_index)
        .bind(Self::timestamp_to_millis(&status.last_update))
        .execute(&self.pool)
        .await?;

        debug!("stored zone status");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn zone_by_id(&self, zone_id: &str) -> StorageResult<Option<ZoneStatus>> {
        let row = sqlx::query(
            r#"
            SELECT zone_id, name, status, active_sensors, active_alerts,
                   total_flow_rate, average_pressure, water_quality_index, last_update
            FROM zone_status
            WHERE zone_id = ?
            "#,
        )
        .bind(zone_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::zone_from_row).transpose()
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.alert_id))]
    async fn save_alert(&self, alert: &Alert) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO alerts (
                alert_id, alert_type, severity, sensor_id, zone_id, message, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.alert_id.to_string())
        .bind(enum_to_text(&alert.alert_type)?)
        .bind(enum_to_text(&alert.severity)?)
        .bind(&alert.sensor_id)
        .bind(&alert.zone_id)
        .bind(&alert.message)
        .bind(Self::timestamp_to_millis(&alert.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent_alerts(&self, zone_id: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT alert_id, alert_type, severity, sensor_id, zone_id, message, timestamp
            FROM alerts
            WHERE zone_id = ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(zone_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::alert_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let before_millis = Self::timestamp_to_millis(&before);

        info!("cleaning up records older than {}", before);

        let mut tx = self.pool.begin().await?;

        let readings = sqlx::query(
            r#"
            DELETE FROM sensor_readings
            WHERE timestamp < ?
              AND id NOT IN (SELECT MAX(id) FROM sensor_readings GROUP BY sensor_id)
            "#,
        )
        .bind(before_millis)
        .execute(&mut *tx)
        .await?;

        let alerts = sqlx::query("DELETE FROM alerts WHERE timestamp < ?")
            .bind(before_millis)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = (readings.rows_affected() + alerts.rows_affected()) as usize;
        info!("deleted {} old records", deleted);

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
