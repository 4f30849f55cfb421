//! Randomized initial readings and simulated drift
//!
//! Every sensor gets its own random source. With a configured seed the
//! source is derived from the seed and the sensor id, so runs are
//! reproducible per sensor regardless of registration order.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ReadingUpdate;

pub const FLOW_RANGE: RangeInclusive<f64> = 40.0..=130.0;
pub const PRESSURE_RANGE: RangeInclusive<f64> = 5.0..=120.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 10.0..=30.0;
pub const PH_RANGE: RangeInclusive<f64> = 4.5..=9.0;
pub const TURBIDITY_RANGE: RangeInclusive<f64> = 1.0..=5.0;

/// Draws a value from an inclusive range
pub trait RangeSource {
    fn draw(&mut self, range: RangeInclusive<f64>) -> f64;
}

impl<R: Rng> RangeSource for R {
    fn draw(&mut self, range: RangeInclusive<f64>) -> f64 {
        self.gen_range(range)
    }
}

/// Hands out per-sensor random sources
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingSeeder {
    seed: Option<u64>,
}

impl ReadingSeeder {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn source_for(&self, key: &str) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(&seed.to_le_bytes());
                hasher.update(key.as_bytes());
                StdRng::from_seed(*hasher.finalize().as_bytes())
            }
            None => StdRng::from_entropy(),
        }
    }
}

/// Measurements for a freshly registered sensor
pub fn initial_measurements(source: &mut impl RangeSource) -> ReadingUpdate {
    ReadingUpdate {
        flow_rate: source.draw(FLOW_RANGE),
        pressure: source.draw(PRESSURE_RANGE),
        temperature: source.draw(TEMPERATURE_RANGE),
        ph: source.draw(PH_RANGE),
        turbidity: source.draw(TURBIDITY_RANGE),
    }
}

fn step(current: f64, delta: f64, source: &mut impl RangeSource, bounds: RangeInclusive<f64>) -> f64 {
    (current + source.draw(-delta..=delta)).clamp(*bounds.start(), *bounds.end())
}

/// One random-walk step away from `current`, kept inside the seed ranges
pub fn drift(current: &ReadingUpdate, source: &mut impl RangeSource) -> ReadingUpdate {
    ReadingUpdate {
        flow_rate: step(current.flow_rate, 5.0, source, FLOW_RANGE),
        pressure: step(current.pressure, 3.0, source, PRESSURE_RANGE),
        temperature: step(current.temperature, 0.5, source, TEMPERATURE_RANGE),
        ph: step(current.ph, 0.1, source, PH_RANGE),
        turbidity: step(current.turbidity, 0.3, source, TURBIDITY_RANGE),
    }
}
