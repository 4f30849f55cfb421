pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod monitors;
pub mod seed;
pub mod storage;
pub mod system;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{EntityError, EntityResult};

/// Kind of physical sensor installed in a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    FlowMeter,
    Pressure,
    Quality,
    Temperature,
    Mixed,
}

impl SensorKind {
    /// Whether readings of this kind take part in the leak heuristic
    pub fn measures_flow(self) -> bool {
        matches!(self, SensorKind::FlowMeter | SensorKind::Mixed)
    }
}

/// Latest state of one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub zone_id: String,
    pub location: String,
    pub kind: SensorKind,

    /// L/min
    pub flow_rate: f64,
    /// PSI
    pub pressure: f64,
    /// °C
    pub temperature: f64,
    pub ph: f64,
    /// NTU
    pub turbidity: f64,

    pub timestamp: DateTime<Utc>,
    pub active: bool,
}

impl SensorReading {
    /// Create an active reading with the given measurements, stamped now
    pub fn new(
        sensor_id: impl Into<String>,
        zone_id: impl Into<String>,
        location: impl Into<String>,
        kind: SensorKind,
        measurements: ReadingUpdate,
    ) -> Self {
        let mut reading = Self {
            sensor_id: sensor_id.into(),
            zone_id: zone_id.into(),
            location: location.into(),
            kind,
            flow_rate: 0.0,
            pressure: 0.0,
            temperature: 0.0,
            ph: 0.0,
            turbidity: 0.0,
            timestamp: Utc::now(),
            active: true,
        };
        reading.apply(&measurements);
        reading
    }

    /// Replace the measurements, keeping identity and activity untouched
    pub fn apply(&mut self, update: &ReadingUpdate) {
        self.flow_rate = update.flow_rate;
        self.pressure = update.pressure;
        self.temperature = update.temperature;
        self.ph = update.ph;
        self.turbidity = update.turbidity;
        self.timestamp = Utc::now();
    }

    pub fn measurements(&self) -> ReadingUpdate {
        ReadingUpdate {
            flow_rate: self.flow_rate,
            pressure: self.pressure,
            temperature: self.temperature,
            ph: self.ph,
            turbidity: self.turbidity,
        }
    }
}

/// The mutable part of a [`SensorReading`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingUpdate {
    pub flow_rate: f64,
    pub pressure: f64,
    pub temperature: f64,
    pub ph: f64,
    pub turbidity: f64,
}

impl ReadingUpdate {
    /// Reject values no physical sensor can report
    pub fn validate(&self) -> EntityResult<()> {
        let fields = [
            ("flow_rate", self.flow_rate),
            ("pressure", self.pressure),
            ("temperature", self.temperature),
            ("ph", self.ph),
            ("turbidity", self.turbidity),
        ];

        if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(EntityError::InvalidReading(format!("{name} must be a finite number")));
        }

        if let Some((name, value)) = fields
            .iter()
            .filter(|(name, _)| matches!(*name, "flow_rate" | "pressure" | "turbidity"))
            .find(|(_, value)| *value < 0.0)
        {
            return Err(EntityError::InvalidReading(format!(
                "{name} must not be negative (got {value})"
            )));
        }

        if !(0.0..=14.0).contains(&self.ph) {
            return Err(EntityError::InvalidReading(format!(
                "ph must be within [0, 14] (got {})",
                self.ph
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowPressure,
    HighPressure,
    PoorWaterQuality,
    LeakDetected,
    SensorMalfunction,
    FlowAnomaly,
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    /// Critical and emergency alerts
    pub fn is_critical(self) -> bool {
        self >= AlertSeverity::Critical
    }
}

/// An immutable alert raised for one sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub sensor_id: String,
    pub zone_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        reading: &SensorReading,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            alert_type,
            severity,
            sensor_id: reading.sensor_id.clone(),
            zone_id: reading.zone_id.clone(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_critical_leak(&self) -> bool {
        self.alert_type == AlertType::LeakDetected && self.severity.is_critical()
    }
}

/// Qualitative zone label, derived from metrics and alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Normal,
    LowPressure,
    HighPressure,
    QualityIssue,
    LeakDetected,
    Maintenance,
}

/// Aggregated status of a zone for one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub zone_id: String,
    pub name: String,
    pub active_sensors: Vec<String>,
    pub active_alerts: Vec<Alert>,
    pub total_flow_rate: f64,
    pub average_pressure: f64,
    /// 0..=100
    pub water_quality_index: f64,
    pub status: ZoneState,
    pub last_update: DateTime<Utc>,
}

impl ZoneStatus {
    /// A zone without contributing readings
    pub fn maintenance(
        zone_id: impl Into<String>,
        name: impl Into<String>,
        active_sensors: Vec<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            name: name.into(),
            active_sensors,
            active_alerts: vec![],
            total_flow_rate: 0.0,
            average_pressure: 0.0,
            water_quality_index: 0.0,
            status: ZoneState::Maintenance,
            last_update: Utc::now(),
        }
    }
}

/// Result of an idempotent registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Created,
    AlreadyExists,
}

impl RegistrationOutcome {
    pub fn is_created(self) -> bool {
        self == RegistrationOutcome::Created
    }
}

/// System-wide figures computed by the manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_zones: usize,
    pub total_sensors: usize,
    pub total_flow_rate: f64,
    pub average_system_pressure: f64,
    pub average_water_quality: f64,
    pub zones_in_normal_status: usize,
    pub zones_with_issues: usize,
    pub active_critical_alerts: usize,
}

impl SystemOverview {
    /// Flatten into the `name -> number` view exposed to callers
    pub fn to_map(&self) -> std::collections::BTreeMap<String, f64> {
        [
            ("total_zones", self.total_zones as f64),
            ("total_sensors", self.total_sensors as f64),
            ("total_flow_rate", self.total_flow_rate),
            ("average_system_pressure", self.average_system_pressure),
            ("average_water_quality", self.average_water_quality),
            ("zones_in_normal_status", self.zones_in_normal_status as f64),
            ("zones_with_issues", self.zones_with_issues as f64),
            ("active_critical_alerts", self.active_critical_alerts as f64),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }
}
