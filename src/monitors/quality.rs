//! Step-function scoring of water quality on a 0-100 scale

use crate::SensorReading;

/// Quality index below which a zone is flagged
pub const QUALITY_ISSUE_THRESHOLD: f64 = 60.0;

fn step(bands: &[(bool, f64)]) -> f64 {
    bands
        .iter()
        .find(|(matches, _)| *matches)
        .map(|(_, score)| *score)
        .unwrap_or(40.0)
}

pub fn ph_score(ph: f64) -> f64 {
    step(&[
        ((6.5..=8.5).contains(&ph), 100.0),
        ((6.0..=9.0).contains(&ph), 80.0),
        ((5.5..=9.5).contains(&ph), 60.0),
    ])
}

pub fn turbidity_score(turbidity: f64) -> f64 {
    step(&[
        (turbidity <= 1.0, 100.0),
        (turbidity <= 4.0, 80.0),
        (turbidity <= 10.0, 60.0),
    ])
}

pub fn temperature_score(temperature: f64) -> f64 {
    step(&[
        ((10.0..=20.0).contains(&temperature), 100.0),
        ((5.0..=25.0).contains(&temperature), 80.0),
        ((0.0..=30.0).contains(&temperature), 60.0),
    ])
}

pub fn reading_score(reading: &SensorReading) -> f64 {
    (ph_score(reading.ph) + turbidity_score(reading.turbidity) + temperature_score(reading.temperature))
        / 3.0
}

/// Mean of the per-reading scores, 0 when there is nothing to score
pub fn water_quality_index(readings: &[SensorReading]) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    readings.iter().map(reading_score).sum::<f64>() / readings.len() as f64
}
