//! Keyed lookup of entities with on-demand activation
//!
//! Asking the directory for an id always yields a usable handle: if no
//! entity is running for the id (never activated, idle-evicted or shut
//! down) a fresh actor is spawned and restores itself from the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::manager::ManagerHandle;
use super::messages::SensorCommand;
use super::sensor::SensorHandle;
use super::zone::ZoneHandle;
use crate::bus::AlertBus;
use crate::cache::Cache;
use crate::config::Config;
use crate::seed::ReadingSeeder;
use crate::storage::StorageBackend;

/// Timing knobs shared by all entities
#[derive(Debug, Clone, Copy)]
pub struct EntityTiming {
    /// Delay before a zone's first timed refresh
    pub warmup: Duration,
    /// Period of the zone refresh timer
    pub refresh_interval: Duration,
    /// Upper bound for each call a zone makes to a sensor
    pub sensor_timeout: Duration,
    /// Sensors without commands for this long retire
    pub sensor_idle_timeout: Option<Duration>,
}

impl From<&Config> for EntityTiming {
    fn from(config: &Config) -> Self {
        Self {
            warmup: config.refresh.warmup(),
            refresh_interval: config.refresh.interval(),
            sensor_timeout: config.refresh.sensor_timeout(),
            sensor_idle_timeout: config.sensor_idle_timeout(),
        }
    }
}

/// Collaborators injected into every entity
#[derive(Clone)]
pub struct EntityServices {
    pub store: Arc<dyn StorageBackend>,
    pub cache: Arc<dyn Cache>,
    pub bus: AlertBus,
    pub seeder: ReadingSeeder,
    pub timing: EntityTiming,
}

/// Implemented by entity handles so the directory can spawn and recycle them
pub trait EntityHandle: Clone {
    fn spawn(key: &str, directory: Directory) -> Self;
    fn is_closed(&self) -> bool;
    fn request_shutdown(&self);
}

struct DirectoryInner {
    services: EntityServices,
    sensors: Mutex<HashMap<String, SensorHandle>>,
    zones: Mutex<HashMap<String, ZoneHandle>>,
    managers: Mutex<HashMap<String, ManagerHandle>>,
}

#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

impl Directory {
    pub fn new(services: EntityServices) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                services,
                sensors: Mutex::new(HashMap::new()),
                zones: Mutex::new(HashMap::new()),
                managers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn services(&self) -> &EntityServices {
        &self.inner.services
    }

    pub async fn sensor(&self, sensor_id: &str) -> SensorHandle {
        self.activate(&self.inner.sensors, sensor_id).await
    }

    pub async fn zone(&self, zone_id: &str) -> ZoneHandle {
        self.activate(&self.inner.zones, zone_id).await
    }

    pub async fn manager(&self, manager_id: &str) -> ManagerHandle {
        self.activate(&self.inner.managers, manager_id).await
    }

    async fn activate<H: EntityHandle>(&self, entities: &Mutex<HashMap<String, H>>, key: &str) -> H {
        let mut entities = entities.lock().await;

        if let Some(handle) = entities.get(key) {
            if !handle.is_closed() {
                return handle.clone();
            }
            debug!("reactivating entity {}", key);
        }

        let handle = H::spawn(key, self.clone());
        entities.insert(key.to_string(), handle.clone());
        handle
    }

    /// Retire an idle sensor unless commands are already queued for it
    ///
    /// Runs under the sensor map lock, so no new handle can be handed out
    /// between the emptiness check and closing the mailbox. Returns false if
    /// the sensor has work and must keep running.
    pub(crate) async fn retire_sensor(
        &self,
        sensor_id: &str,
        command_rx: &mut mpsc::Receiver<SensorCommand>,
    ) -> bool {
        let mut sensors = self.inner.sensors.lock().await;
        if !command_rx.is_empty() {
            return false;
        }

        command_rx.close();
        sensors.remove(sensor_id);
        true
    }

    /// Number of sensor actors currently running
    pub async fn running_sensors(&self) -> usize {
        Self::running(&self.inner.sensors).await
    }

    pub async fn running_zones(&self) -> usize {
        Self::running(&self.inner.zones).await
    }

    async fn running<H: EntityHandle>(entities: &Mutex<HashMap<String, H>>) -> usize {
        entities
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    /// Stop every entity and forget its handle
    pub async fn shutdown(&self) {
        Self::shutdown_all(&self.inner.managers).await;
        Self::shutdown_all(&self.inner.zones).await;
        Self::shutdown_all(&self.inner.sensors).await;
    }

    async fn shutdown_all<H: EntityHandle>(entities: &Mutex<HashMap<String, H>>) {
        let drained: Vec<H> = entities.lock().await.drain().map(|(_, h)| h).collect();
        for handle in drained {
            handle.request_shutdown();
        }
    }
}
