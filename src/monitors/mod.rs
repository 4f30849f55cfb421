//! Pure evaluation of readings: per-sensor anomaly rules, water quality
//! scoring and zone status derivation.

pub mod anomaly;
pub mod quality;
pub mod zone_status;
