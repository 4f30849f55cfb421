use crate::{Alert, AlertSeverity, AlertType, SensorReading};

pub const LOW_PRESSURE_PSI: f64 = 30.0;
pub const CRITICAL_LOW_PRESSURE_PSI: f64 = 20.0;
pub const HIGH_PRESSURE_PSI: f64 = 100.0;
pub const CRITICAL_HIGH_PRESSURE_PSI: f64 = 120.0;

pub const MIN_PH: f64 = 6.5;
pub const MAX_PH: f64 = 8.5;

pub const TURBIDITY_LIMIT_NTU: f64 = 4.0;
pub const CRITICAL_TURBIDITY_NTU: f64 = 10.0;

/// Outcome of comparing a single measurement against its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureEvaluation {
    Ok,
    Low(AlertSeverity),
    High(AlertSeverity),
}

impl PressureEvaluation {
    pub fn evaluate(pressure: f64) -> PressureEvaluation {
        if pressure < LOW_PRESSURE_PSI {
            let severity = if pressure < CRITICAL_LOW_PRESSURE_PSI {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            return PressureEvaluation::Low(severity);
        }

        if pressure > HIGH_PRESSURE_PSI {
            let severity = if pressure > CRITICAL_HIGH_PRESSURE_PSI {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            return PressureEvaluation::High(severity);
        }

        PressureEvaluation::Ok
    }
}

/// Evaluate one reading against the fixed thresholds.
///
/// At most one pressure alert is raised (low wins over high, which are
/// mutually exclusive anyway), plus independent pH and turbidity alerts.
pub fn check_anomalies(reading: &SensorReading) -> Vec<Alert> {
    let mut alerts = vec![];

    match PressureEvaluation::evaluate(reading.pressure) {
        PressureEvaluation::Low(severity) => alerts.push(Alert::new(
            AlertType::LowPressure,
            severity,
            reading,
            format!("Low pressure detected: {:.1} PSI", reading.pressure),
        )),
        PressureEvaluation::High(severity) => alerts.push(Alert::new(
            AlertType::HighPressure,
            severity,
            reading,
            format!("High pressure detected: {:.1} PSI", reading.pressure),
        )),
        PressureEvaluation::Ok => {}
    }

    if reading.ph < MIN_PH || reading.ph > MAX_PH {
        alerts.push(Alert::new(
            AlertType::PoorWaterQuality,
            AlertSeverity::Warning,
            reading,
            format!("pH out of range: {:.2}", reading.ph),
        ));
    }

    if reading.turbidity > TURBIDITY_LIMIT_NTU {
        let severity = if reading.turbidity > CRITICAL_TURBIDITY_NTU {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(Alert::new(
            AlertType::PoorWaterQuality,
            severity,
            reading,
            format!("High turbidity: {:.2} NTU", reading.turbidity),
        ));
    }

    alerts
}
