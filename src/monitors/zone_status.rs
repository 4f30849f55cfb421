//! Derivation of a zone's metrics and status label from one cycle of
//! sensor readings and alerts.
//!
//! Everything here is a pure function so the zone entity only has to
//! collect inputs and store the result.

use chrono::Utc;

use super::anomaly::{HIGH_PRESSURE_PSI, LOW_PRESSURE_PSI};
use super::quality::{QUALITY_ISSUE_THRESHOLD, water_quality_index};
use crate::{Alert, SensorReading, ZoneState, ZoneStatus};

/// Ratio of flow spread to mean flow at which a leak is suspected
pub const LEAK_SPREAD_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneMetrics {
    pub total_flow_rate: f64,
    pub average_pressure: f64,
    pub water_quality_index: f64,
}

impl ZoneMetrics {
    pub fn from_readings(readings: &[SensorReading]) -> Option<ZoneMetrics> {
        if readings.is_empty() {
            return None;
        }

        let count = readings.len() as f64;
        Some(ZoneMetrics {
            total_flow_rate: readings.iter().map(|r| r.flow_rate).sum(),
            average_pressure: readings.iter().map(|r| r.pressure).sum::<f64>() / count,
            water_quality_index: water_quality_index(readings),
        })
    }
}

/// Flow-divergence test over flow-capable sensors.
///
/// Needs at least two flow meters or mixed sensors. The spread is
/// compared inclusively, so `{100, 100, 160}` (spread 60, mean 120) flags.
pub fn leak_suspected(readings: &[SensorReading]) -> bool {
    let flows: Vec<f64> = readings
        .iter()
        .filter(|r| r.kind.measures_flow())
        .map(|r| r.flow_rate)
        .collect();

    if flows.len() < 2 {
        return false;
    }

    let max = flows.iter().copied().fold(f64::MIN, f64::max);
    let min = flows.iter().copied().fold(f64::MAX, f64::min);
    let mean = flows.iter().sum::<f64>() / flows.len() as f64;

    max - min >= LEAK_SPREAD_RATIO * mean
}

/// Status label, first match wins
pub fn derive_state(metrics: Option<&ZoneMetrics>, alerts: &[Alert], leak_suspected: bool) -> ZoneState {
    let Some(metrics) = metrics else {
        return ZoneState::Maintenance;
    };

    if alerts.iter().any(Alert::is_critical_leak) {
        ZoneState::LeakDetected
    } else if metrics.average_pressure < LOW_PRESSURE_PSI {
        ZoneState::LowPressure
    } else if metrics.average_pressure > HIGH_PRESSURE_PSI {
        ZoneState::HighPressure
    } else if metrics.water_quality_index < QUALITY_ISSUE_THRESHOLD {
        ZoneState::QualityIssue
    } else if leak_suspected {
        ZoneState::LeakDetected
    } else {
        ZoneState::Normal
    }
}

/// Build the full status for one refresh cycle.
///
/// `members` is the zone's membership list and is kept as is, even when
/// no reading was collected.
pub fn derive_status(
    zone_id: &str,
    name: &str,
    members: &[String],
    readings: &[SensorReading],
    alerts: Vec<Alert>,
) -> ZoneStatus {
    let Some(metrics) = ZoneMetrics::from_readings(readings) else {
        return ZoneStatus::maintenance(zone_id, name, members.to_vec());
    };

    let status = derive_state(Some(&metrics), &alerts, leak_suspected(readings));

    ZoneStatus {
        zone_id: zone_id.to_string(),
        name: name.to_string(),
        active_sensors: members.to_vec(),
        active_alerts: alerts,
        total_flow_rate: metrics.total_flow_rate,
        average_pressure: metrics.average_pressure,
        water_quality_index: metrics.water_quality_index,
        status,
        last_update: Utc::now(),
    }
}
