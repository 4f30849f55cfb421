//! ManagerActor - registry of zones and system-wide fan-out views
//!
//! The manager holds no per-reading logic. Each fan-out queries every
//! registered zone concurrently; a failing zone is logged and left out of
//! the result.

use std::collections::{BTreeMap, HashMap};

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use super::directory::{Directory, EntityHandle};
use super::messages::{ManagerCommand, ask};
use super::zone::ZoneHandle;
use crate::{
    Alert, EntityResult, RegistrationOutcome, SensorKind, SensorReading, SystemOverview, ZoneState,
    ZoneStatus,
};

/// Key of the single manager used by the service
pub const DEFAULT_MANAGER_ID: &str = "water-system";

const MANAGER_MAILBOX_SIZE: usize = 32;

/// Demo zones: (zone id, display name, sensor ids)
const TEST_ZONES: &[(&str, &str, &[&str])] = &[
    (
        "zone_downtown",
        "Downtown District",
        &["sensor_dt_001", "sensor_dt_002", "sensor_dt_003"],
    ),
    (
        "zone_residential",
        "Residential Area",
        &["sensor_res_001", "sensor_res_002", "sensor_res_003", "sensor_res_004"],
    ),
    (
        "zone_industrial",
        "Industrial Zone",
        &["sensor_ind_001", "sensor_ind_002"],
    ),
    (
        "zone_suburban",
        "Suburban Area",
        &["sensor_sub_001", "sensor_sub_002", "sensor_sub_003"],
    ),
];

/// Sensor kind from the naming convention `sensor_<area>_<number>`
pub fn kind_for_sensor(sensor_id: &str) -> SensorKind {
    match sensor_id.split('_').nth(1) {
        Some("dt") => SensorKind::Mixed,
        Some("res") => SensorKind::FlowMeter,
        Some("ind") => SensorKind::Pressure,
        Some("sub") => SensorKind::Quality,
        _ => SensorKind::Mixed,
    }
}

/// Human readable location, e.g. `Downtown Sensor 001`
pub fn location_for_sensor(sensor_id: &str) -> String {
    let area = match sensor_id.split('_').nth(1) {
        Some("dt") => "Downtown",
        Some("res") => "Residential",
        Some("ind") => "Industrial",
        Some("sub") => "Suburban",
        _ => "Unknown",
    };
    let number = sensor_id.rsplit('_').next().unwrap_or(sensor_id);
    format!("{area} Sensor {number}")
}

/// Actor that owns the zone registry and the sensor index
///
/// Views over all zones are built by asking every registered zone
/// concurrently.
pub struct ManagerActor {
    /// Manager identifier (directory key)
    manager_id: String,

    /// Access to the zone and sensor entities
    directory: Directory,

    /// Command receiver for registrations and queries
    command_rx: mpsc::Receiver<ManagerCommand>,

    /// zone id → display name
    zones: BTreeMap<String, String>,
    /// sensor id → zone id
    sensor_zones: HashMap<String, String>,
}

impl ManagerActor {
    /// Create a new manager actor with an empty registry
    pub fn new(
        manager_id: String,
        directory: Directory,
        command_rx: mpsc::Receiver<ManagerCommand>,
    ) -> Self {
        Self {
            manager_id,
            directory,
            command_rx,
            zones: BTreeMap::new(),
            sensor_zones: HashMap::new(),
        }
    }

    /// Run the actor's main loop until shutdown or until the channel closes
    #[instrument(skip(self), fields(manager_id = %self.manager_id))]
    pub async fn run(mut self) {
        debug!("starting manager");

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    if !self.handle_command(cmd).await {
                        debug!("manager shut down");
                        break;
                    }
                }
                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: ManagerCommand) -> bool {
        match cmd {
            ManagerCommand::RegisterZone {
                zone_id,
                name,
                sensor_ids,
                respond_to,
            } => {
                let result = self.register_zone(zone_id, name, sensor_ids).await;
                let _ = respond_to.send(result);
            }
            ManagerCommand::RegisterSensor {
                sensor_id,
                location,
                kind,
                zone_id,
                respond_to,
            } => {
                let result = self.register_sensor(sensor_id, location, kind, zone_id).await;
                let _ = respond_to.send(result);
            }
            ManagerCommand::GetAllZonesStatus { respond_to } => {
                let _ = respond_to.send(self.all_zones_status().await);
            }
            ManagerCommand::GetCriticalAlerts { respond_to } => {
                let _ = respond_to.send(self.critical_alerts().await);
            }
            ManagerCommand::GetSensorData {
                sensor_id,
                respond_to,
            } => {
                let result = self.directory.sensor(&sensor_id).await.current_data().await;
                let _ = respond_to.send(result);
            }
            ManagerCommand::GetSystemOverview { respond_to } => {
                let _ = respond_to.send(self.system_overview().await);
            }
            ManagerCommand::DetectedLeaks { respond_to } => {
                let _ = respond_to.send(self.detected_leaks().await);
            }
            ManagerCommand::InitializeTestData { respond_to } => {
                let _ = respond_to.send(self.initialize_test_data().await);
            }
            ManagerCommand::Shutdown => return false,
        }
        true
    }

    async fn register_zone(
        &mut self,
        zone_id: String,
        name: String,
        sensor_ids: Vec<String>,
    ) -> EntityResult<RegistrationOutcome> {
        if self.zones.contains_key(&zone_id) {
            debug!("zone {} already registered", zone_id);
            return Ok(RegistrationOutcome::AlreadyExists);
        }

        let zone = self.directory.zone(&zone_id).await;
        zone.register_zone(name.clone(), sensor_ids.clone()).await?;

        for sensor_id in sensor_ids {
            self.sensor_zones.insert(sensor_id, zone_id.clone());
        }
        info!("registered zone {} ('{}')", zone_id, name);
        self.zones.insert(zone_id, name);

        Ok(RegistrationOutcome::Created)
    }

    async fn register_sensor(
        &mut self,
        sensor_id: String,
        location: String,
        kind: SensorKind,
        zone_id: String,
    ) -> EntityResult<RegistrationOutcome> {
        let sensor = self.directory.sensor(&sensor_id).await;
        let outcome = sensor.register(location, kind, &zone_id).await?;

        // an existing sensor keeps the zone it was first registered in
        let owner = match outcome {
            RegistrationOutcome::Created => zone_id,
            RegistrationOutcome::AlreadyExists => sensor
                .current_data()
                .await
                .map(|reading| reading.zone_id)
                .unwrap_or(zone_id),
        };
        self.sensor_zones.insert(sensor_id, owner);

        Ok(outcome)
    }

    async fn zone_handles(&self) -> Vec<ZoneHandle> {
        join_all(self.zones.keys().map(|zone_id| self.directory.zone(zone_id))).await
    }

    async fn all_zones_status(&self) -> Vec<ZoneStatus> {
        let zones = self.zone_handles().await;
        let results = join_all(zones.iter().map(ZoneHandle::get_zone_status)).await;

        zones
            .iter()
            .zip(results)
            .filter_map(|(zone, result)| match result {
                Ok(status) => Some(status),
                Err(e) => {
                    error!("failed to get status of zone {}: {:#}", zone.zone_id(), e);
                    None
                }
            })
            .collect()
    }

    async fn critical_alerts(&self) -> Vec<Alert> {
        let zones = self.zone_handles().await;
        let results = join_all(zones.iter().map(ZoneHandle::get_active_alerts)).await;

        let mut alerts: Vec<Alert> = zones
            .iter()
            .zip(results)
            .flat_map(|(zone, result)| match result {
                Ok(alerts) => alerts,
                Err(e) => {
                    error!("failed to get alerts of zone {}: {:#}", zone.zone_id(), e);
                    vec![]
                }
            })
            .filter(|alert| alert.severity.is_critical())
            .collect();

        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    /// Counts come from the registry, metrics from the zones that answered
    async fn system_overview(&self) -> SystemOverview {
        let statuses = self.all_zones_status().await;
        let critical = self.critical_alerts().await;

        let mean = |value: fn(&ZoneStatus) -> f64| {
            if statuses.is_empty() {
                0.0
            } else {
                statuses.iter().map(value).sum::<f64>() / statuses.len() as f64
            }
        };
        let normal = statuses
            .iter()
            .filter(|s| s.status == ZoneState::Normal)
            .count();

        SystemOverview {
            total_zones: self.zones.len(),
            total_sensors: self.sensor_zones.len(),
            total_flow_rate: statuses.iter().map(|s| s.total_flow_rate).sum(),
            average_system_pressure: mean(|s: &ZoneStatus| s.average_pressure),
            average_water_quality: mean(|s: &ZoneStatus| s.water_quality_index),
            zones_in_normal_status: normal,
            zones_with_issues: statuses.len() - normal,
            active_critical_alerts: critical.len(),
        }
    }

    async fn detected_leaks(&self) -> Vec<String> {
        let zones = self.zone_handles().await;
        let results = join_all(zones.iter().map(ZoneHandle::is_leak_detected)).await;

        zones
            .iter()
            .zip(results)
            .filter_map(|(zone, result)| match result {
                Ok(true) => Some(zone.zone_id().to_string()),
                Ok(false) => None,
                Err(e) => {
                    error!("failed to check zone {} for leaks: {:#}", zone.zone_id(), e);
                    None
                }
            })
            .collect()
    }

    async fn initialize_test_data(&mut self) -> EntityResult<()> {
        info!("initializing test data");
        self.zones.clear();
        self.sensor_zones.clear();

        for (zone_id, name, sensor_ids) in TEST_ZONES {
            for sensor_id in sensor_ids.iter() {
                let sensor = self.directory.sensor(sensor_id).await;
                let result = sensor
                    .register(location_for_sensor(sensor_id), kind_for_sensor(sensor_id), *zone_id)
                    .await;

                match result {
                    Ok(outcome) => {
                        debug!("test sensor {}: {:?}", sensor_id, outcome);
                        self.sensor_zones
                            .insert(sensor_id.to_string(), zone_id.to_string());
                    }
                    Err(e) => warn!("failed to register test sensor {}: {:#}", sensor_id, e),
                }
            }

            let sensor_ids = sensor_ids.iter().map(|id| id.to_string()).collect();
            if let Err(e) = self
                .register_zone(zone_id.to_string(), name.to_string(), sensor_ids)
                .await
            {
                warn!("failed to register test zone {}: {:#}", zone_id, e);
            }
        }

        info!(
            "test data initialized: {} zones, {} sensors",
            self.zones.len(),
            self.sensor_zones.len()
        );
        Ok(())
    }
}

/// Handle for talking to the ManagerActor
#[derive(Clone, Debug)]
pub struct ManagerHandle {
    label: String,
    sender: mpsc::Sender<ManagerCommand>,
}

impl EntityHandle for ManagerHandle {
    fn spawn(key: &str, directory: Directory) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(MANAGER_MAILBOX_SIZE);
        let actor = ManagerActor::new(key.to_string(), directory, cmd_rx);

        tokio::spawn(actor.run());

        Self {
            label: format!("manager {key}"),
            sender: cmd_tx,
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn request_shutdown(&self) {
        let _ = self.sender.try_send(ManagerCommand::Shutdown);
    }
}

impl ManagerHandle {
    /// Idempotent on the zone id
    pub async fn register_zone(
        &self,
        zone_id: impl Into<String>,
        name: impl Into<String>,
        sensor_ids: Vec<String>,
    ) -> EntityResult<RegistrationOutcome> {
        let (zone_id, name) = (zone_id.into(), name.into());
        ask(&self.sender, &self.label, |respond_to| ManagerCommand::RegisterZone {
            zone_id,
            name,
            sensor_ids,
            respond_to,
        })
        .await?
    }

    pub async fn register_sensor(
        &self,
        sensor_id: impl Into<String>,
        location: impl Into<String>,
        kind: SensorKind,
        zone_id: impl Into<String>,
    ) -> EntityResult<RegistrationOutcome> {
        let (sensor_id, location, zone_id) = (sensor_id.into(), location.into(), zone_id.into());
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::RegisterSensor {
                sensor_id,
                location,
                kind,
                zone_id,
                respond_to,
            }
        })
        .await?
    }

    pub async fn get_all_zones_status(&self) -> EntityResult<Vec<ZoneStatus>> {
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::GetAllZonesStatus { respond_to }
        })
        .await
    }

    /// Critical and emergency alerts of all zones, newest first
    pub async fn get_critical_alerts(&self) -> EntityResult<Vec<Alert>> {
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::GetCriticalAlerts { respond_to }
        })
        .await
    }

    pub async fn get_sensor_data(&self, sensor_id: impl Into<String>) -> EntityResult<SensorReading> {
        let sensor_id = sensor_id.into();
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::GetSensorData {
                sensor_id,
                respond_to,
            }
        })
        .await?
    }

    pub async fn get_system_overview(&self) -> EntityResult<SystemOverview> {
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::GetSystemOverview { respond_to }
        })
        .await
    }

    /// Ids of the zones currently flagging a leak
    pub async fn detected_leaks(&self) -> EntityResult<Vec<String>> {
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::DetectedLeaks { respond_to }
        })
        .await
    }

    pub async fn initialize_test_data(&self) -> EntityResult<()> {
        ask(&self.sender, &self.label, |respond_to| {
            ManagerCommand::InitializeTestData { respond_to }
        })
        .await?
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(ManagerCommand::Shutdown).await;
    }
}
