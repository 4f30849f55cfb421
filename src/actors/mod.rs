//! Entity runtime for sensors, zones and the system manager
//!
//! Every entity is an actor: an independent Tokio task that owns its state
//! and processes one command at a time from its mailbox. Entities address
//! each other by key through the [`Directory`], which activates actors on
//! first use.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │   ManagerActor   │  registry, fan-out views
//!                 └────────┬─────────┘
//!                          │ per zone
//!             ┌────────────┼────────────┐
//!     ┌───────▼──────┐            ┌─────▼────────┐
//!     │  ZoneActor   │   ...      │  ZoneActor   │  timer-driven refresh
//!     └───────┬──────┘            └─────┬────────┘
//!             │ per sensor              │
//!     ┌───────▼──────┐            ┌─────▼────────┐
//!     │ SensorActor  │   ...      │ SensorActor  │  latest reading
//!     └──────────────┘            └──────────────┘
//!
//!   all of them: StorageBackend (durable) · Cache (mirror) · AlertBus (alerts)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel
//! 2. **Request/Response**: queries carry a oneshot channel
//! 3. **Events**: zones publish alerts on a broadcast channel

pub mod directory;
pub mod manager;
pub mod messages;
pub mod sensor;
pub mod zone;

pub use directory::{Directory, EntityHandle, EntityServices, EntityTiming};
pub use manager::{DEFAULT_MANAGER_ID, ManagerHandle};
pub use sensor::SensorHandle;
pub use zone::ZoneHandle;

#[cfg(test)]
pub(crate) fn test_directory(seed: Option<u64>) -> Directory {
    let hour = std::time::Duration::from_secs(3600);
    build_test_directory(seed, hour, hour)
}

#[cfg(test)]
pub(crate) fn test_directory_with(
    warmup: std::time::Duration,
    refresh_interval: std::time::Duration,
) -> Directory {
    build_test_directory(None, warmup, refresh_interval)
}

#[cfg(test)]
fn build_test_directory(
    seed: Option<u64>,
    warmup: std::time::Duration,
    refresh_interval: std::time::Duration,
) -> Directory {
    use std::sync::Arc;

    Directory::new(EntityServices {
        store: Arc::new(crate::storage::MemoryBackend::new()),
        cache: Arc::new(crate::cache::MemoryCache::new()),
        bus: crate::bus::AlertBus::new(64),
        seeder: crate::seed::ReadingSeeder::new(seed),
        timing: EntityTiming {
            warmup,
            refresh_interval,
            sensor_timeout: std::time::Duration::from_millis(500),
            sensor_idle_timeout: None,
        },
    })
}
