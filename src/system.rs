//! Top-level wiring of the entity runtime and its collaborators

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::Alert;
use crate::actors::{
    DEFAULT_MANAGER_ID, Directory, EntityServices, EntityTiming, ManagerHandle, SensorHandle,
    ZoneHandle,
};
use crate::alerts::NotifierHandle;
use crate::bus::AlertBus;
use crate::cache::MemoryCache;
use crate::config::{Config, StorageConfig};
use crate::seed::ReadingSeeder;
use crate::storage::{self, StorageBackend};

/// Run retention cleanup daily
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// A running monitoring system
pub struct WaterSystem {
    directory: Directory,
    notifier: Option<NotifierHandle>,
    retention: Option<JoinHandle<()>>,
}

impl WaterSystem {
    /// Open storage, wire all collaborators and start background tasks
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let store = storage::open_backend(config.storage.as_ref()).await?;

        let services = EntityServices {
            store: store.clone(),
            cache: Arc::new(MemoryCache::new()),
            bus: AlertBus::new(config.bus_capacity),
            seeder: ReadingSeeder::new(config.seed),
            timing: EntityTiming::from(config),
        };

        let mut system = Self::with_services(services);

        if let Some(webhook) = config.webhook() {
            info!("forwarding alerts to webhook {}", webhook.url);
            system.notifier = Some(NotifierHandle::spawn(
                webhook.clone(),
                system.subscribe_alerts(),
            ));
        }

        if let Some(StorageConfig::Sqlite { retention_days, .. }) = &config.storage {
            system.retention = Some(spawn_retention(store, *retention_days));
        }

        Ok(system)
    }

    /// Wire a system around explicitly provided collaborators
    pub fn with_services(services: EntityServices) -> Self {
        Self {
            directory: Directory::new(services),
            notifier: None,
            retention: None,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn store(&self) -> Arc<dyn StorageBackend> {
        self.directory.services().store.clone()
    }

    pub async fn manager(&self) -> ManagerHandle {
        self.directory.manager(DEFAULT_MANAGER_ID).await
    }

    pub async fn sensor(&self, sensor_id: &str) -> SensorHandle {
        self.directory.sensor(sensor_id).await
    }

    pub async fn zone(&self, zone_id: &str) -> ZoneHandle {
        self.directory.zone(zone_id).await
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.directory.services().bus.subscribe()
    }

    /// Stop all entities and background tasks, then close the store
    pub async fn shutdown(self) {
        info!("shutting down water system");

        if let Some(notifier) = &self.notifier {
            notifier.shutdown().await;
        }
        if let Some(retention) = &self.retention {
            retention.abort();
        }

        self.directory.shutdown().await;

        if let Err(e) = self.directory.services().store.close().await {
            error!("failed to close storage backend: {:#}", e);
        }
    }
}

/// Delete records older than the retention period, once at startup and then daily
fn spawn_retention(store: Arc<dyn StorageBackend>, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            ticker.tick().await;

            let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days));
            debug!("running retention cleanup (deleting data before {})", cutoff);

            match store.cleanup_before(cutoff).await {
                Ok(0) => trace!("retention cleanup: nothing to delete"),
                Ok(deleted) => info!("retention cleanup complete: deleted {} old records", deleted),
                Err(e) => error!("retention cleanup failed: {:#}", e),
            }
        }
    })
}
