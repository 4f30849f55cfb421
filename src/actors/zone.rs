//! ZoneActor - aggregates the readings of a zone's sensors
//!
//! ## Refresh cycle
//!
//! ```text
//! Timer tick / command → poll every member sensor concurrently (bounded by a timeout)
//!                      → derive metrics + status label
//!                      → publish alerts → persist status (store, then cache)
//! ```
//!
//! A sensor that fails, times out or is inactive is left out of the cycle;
//! it never aborts the refresh. Refreshes run inside the actor loop, so two
//! of them never overlap.

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use super::directory::{Directory, EntityHandle};
use super::messages::{ZoneCommand, ask};
use super::sensor::SensorHandle;
use crate::cache::{self, zone_key};
use crate::monitors::zone_status;
use crate::{Alert, EntityError, EntityResult, SensorReading, ZoneState, ZoneStatus};

const ZONE_MAILBOX_SIZE: usize = 64;

/// Actor that aggregates the sensors of one zone
///
/// Each zone gets its own actor. It refreshes on a timer after a warm-up
/// delay and on demand, and answers status queries from its last cycle.
pub struct ZoneActor {
    /// Zone identifier (directory key)
    zone_id: String,

    /// Shared services and access to the member sensors
    directory: Directory,

    /// Command receiver for queries and control messages
    command_rx: mpsc::Receiver<ZoneCommand>,

    /// Display name, empty until registered
    name: String,

    /// Set semantics, kept in insertion order
    members: Vec<String>,

    /// Result of the last refresh cycle
    status: Option<ZoneStatus>,

    /// Flow-divergence heuristic of the last cycle
    leak_suspected: bool,
}

impl ZoneActor {
    /// Create a new zone actor
    pub fn new(zone_id: String, directory: Directory, command_rx: mpsc::Receiver<ZoneCommand>) -> Self {
        Self {
            zone_id,
            directory,
            command_rx,
            name: String::new(),
            members: vec![],
            status: None,
            leak_suspected: false,
        }
    }

    /// Run the actor's main loop
    ///
    /// Restores the zone from the store first, then runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(zone_id = %self.zone_id))]
    pub async fn run(mut self) {
        self.restore().await;

        let timing = self.directory.services().timing;
        let mut ticker = time::interval_at(Instant::now() + timing.warmup, timing.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_known() {
                        trace!("zone not registered, skipping refresh");
                        continue;
                    }
                    if let Err(e) = self.refresh().await {
                        error!("zone refresh failed: {:#}", e);
                    }
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            debug!("zone shut down");
                            break;
                        }
                    }
                    None => {
                        warn!("command channel closed, shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn is_known(&self) -> bool {
        !self.name.is_empty() || !self.members.is_empty() || self.status.is_some()
    }

    fn not_found(&self) -> EntityError {
        EntityError::NotFound(format!("zone {}", self.zone_id))
    }

    async fn restore(&mut self) {
        let services = self.directory.services();

        let stored = match services.store.zone_by_id(&self.zone_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("failed to load zone from store, trying cache: {:#}", e);
                cache::read_through(services.cache.as_ref(), &zone_key(&self.zone_id)).await
            }
        };

        if let Some(status) = stored {
            trace!("restored zone with {} sensors", status.active_sensors.len());
            self.name = status.name.clone();
            self.members = status.active_sensors.clone();
            self.leak_suspected = status.status == ZoneState::LeakDetected
                && !status.active_alerts.iter().any(Alert::is_critical_leak);
            self.status = Some(status);
        }
    }

    async fn handle_command(&mut self, cmd: ZoneCommand) -> bool {
        match cmd {
            ZoneCommand::Register {
                name,
                sensor_ids,
                respond_to,
            } => {
                let result = self.register(name, sensor_ids).await;
                let _ = respond_to.send(result);
            }
            ZoneCommand::AddSensor {
                sensor_id,
                respond_to,
            } => {
                let result = self.add_sensor(sensor_id).await;
                let _ = respond_to.send(result);
            }
            ZoneCommand::RemoveSensor {
                sensor_id,
                respond_to,
            } => {
                let result = self.remove_sensor(&sensor_id).await;
                let _ = respond_to.send(result);
            }
            ZoneCommand::GetStatus { respond_to } => {
                let result = match &self.status {
                    Some(status) => Ok(status.clone()),
                    None if self.is_known() => self.refresh().await,
                    None => Err(self.not_found()),
                };
                let _ = respond_to.send(result);
            }
            ZoneCommand::GetActiveAlerts { respond_to } => {
                let result = if self.is_known() {
                    Ok(self
                        .status
                        .as_ref()
                        .map(|s| s.active_alerts.clone())
                        .unwrap_or_default())
                } else {
                    Err(self.not_found())
                };
                let _ = respond_to.send(result);
            }
            ZoneCommand::IsLeakDetected { respond_to } => {
                let flagged = self.leak_suspected
                    || self
                        .status
                        .as_ref()
                        .is_some_and(|s| s.active_alerts.iter().any(Alert::is_critical_leak));
                let _ = respond_to.send(flagged);
            }
            ZoneCommand::Refresh { respond_to } => {
                let result = if self.is_known() {
                    self.refresh().await
                } else {
                    Err(self.not_found())
                };
                match respond_to {
                    Some(respond_to) => {
                        let _ = respond_to.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("requested refresh failed: {:#}", e);
                        }
                    }
                }
            }
            ZoneCommand::Shutdown => return false,
        }
        true
    }

    async fn register(&mut self, name: String, sensor_ids: Vec<String>) -> EntityResult<ZoneStatus> {
        self.name = name;
        for sensor_id in sensor_ids {
            if !self.members.contains(&sensor_id) {
                self.members.push(sensor_id);
            }
        }

        info!("registered zone '{}' with {} sensors", self.name, self.members.len());
        self.refresh().await
    }

    async fn add_sensor(&mut self, sensor_id: String) -> EntityResult<()> {
        if self.members.contains(&sensor_id) {
            return Ok(());
        }
        debug!("adding sensor {}", sensor_id);
        self.members.push(sensor_id);
        self.persist_membership().await
    }

    async fn remove_sensor(&mut self, sensor_id: &str) -> EntityResult<()> {
        let before = self.members.len();
        self.members.retain(|member| member != sensor_id);
        if self.members.len() == before {
            return Ok(());
        }
        debug!("removed sensor {}", sensor_id);
        self.persist_membership().await
    }

    /// Persist a membership change without running a cycle
    async fn persist_membership(&mut self) -> EntityResult<()> {
        let snapshot = match &mut self.status {
            Some(status) => {
                status.active_sensors = self.members.clone();
                status.clone()
            }
            None => ZoneStatus::maintenance(&self.zone_id, &self.name, self.members.clone()),
        };
        self.persist(&snapshot).await
    }

    async fn persist(&self, status: &ZoneStatus) -> EntityResult<()> {
        let services = self.directory.services();
        services.store.save_zone_status(status).await?;
        cache::write_through(services.cache.as_ref(), &zone_key(&self.zone_id), status).await;
        Ok(())
    }

    /// One aggregation cycle over all member sensors
    async fn refresh(&mut self) -> EntityResult<ZoneStatus> {
        let timeout = self.directory.services().timing.sensor_timeout;

        let mut sensors = Vec::with_capacity(self.members.len());
        for sensor_id in &self.members {
            sensors.push(self.directory.sensor(sensor_id).await);
        }

        let results = join_all(sensors.iter().map(|sensor| poll_sensor(sensor, timeout))).await;

        let mut readings = vec![];
        let mut alerts = vec![];
        for (sensor, result) in sensors.iter().zip(results) {
            match result {
                Ok(Some((reading, sensor_alerts))) => {
                    readings.push(reading);
                    alerts.extend(sensor_alerts);
                }
                Ok(None) => trace!("sensor {} inactive, skipped", sensor.sensor_id()),
                Err(e) => warn!("skipping sensor {}: {:#}", sensor.sensor_id(), e),
            }
        }

        let status =
            zone_status::derive_status(&self.zone_id, &self.name, &self.members, &readings, alerts);
        self.leak_suspected = zone_status::leak_suspected(&readings);

        let bus = &self.directory.services().bus;
        for alert in &status.active_alerts {
            bus.publish(alert.clone());
        }

        debug!(
            "zone refreshed: {:?} ({} of {} sensors, {} alerts)",
            status.status,
            readings.len(),
            self.members.len(),
            status.active_alerts.len()
        );

        self.status = Some(status.clone());
        self.persist(&status).await?;
        Ok(status)
    }
}

/// Reading and anomalies of one active sensor, `None` if it is inactive
async fn poll_sensor(
    sensor: &SensorHandle,
    timeout: Duration,
) -> EntityResult<Option<(SensorReading, Vec<Alert>)>> {
    let poll = async {
        if !sensor.is_active().await? {
            return Ok(None);
        }
        let (reading, alerts) = tokio::try_join!(sensor.current_data(), sensor.check_anomalies())?;
        Ok(Some((reading, alerts)))
    };

    time::timeout(timeout, poll)
        .await
        .map_err(|_| EntityError::Timeout(format!("sensor {}", sensor.sensor_id())))?
}

/// Handle for talking to a ZoneActor
#[derive(Clone, Debug)]
pub struct ZoneHandle {
    zone_id: String,
    label: String,
    sender: mpsc::Sender<ZoneCommand>,
}

impl EntityHandle for ZoneHandle {
    fn spawn(key: &str, directory: Directory) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(ZONE_MAILBOX_SIZE);
        let actor = ZoneActor::new(key.to_string(), directory, cmd_rx);

        tokio::spawn(actor.run());

        Self {
            zone_id: key.to_string(),
            label: format!("zone {key}"),
            sender: cmd_tx,
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn request_shutdown(&self) {
        let _ = self.sender.try_send(ZoneCommand::Shutdown);
    }
}

impl ZoneHandle {
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Name the zone, add the sensors to its membership and run a first cycle
    pub async fn register_zone(
        &self,
        name: impl Into<String>,
        sensor_ids: Vec<String>,
    ) -> EntityResult<ZoneStatus> {
        let name = name.into();
        ask(&self.sender, &self.label, |respond_to| ZoneCommand::Register {
            name,
            sensor_ids,
            respond_to,
        })
        .await?
    }

    pub async fn add_sensor(&self, sensor_id: &str) -> EntityResult<()> {
        let sensor_id = sensor_id.to_string();
        ask(&self.sender, &self.label, |respond_to| ZoneCommand::AddSensor {
            sensor_id,
            respond_to,
        })
        .await?
    }

    pub async fn remove_sensor(&self, sensor_id: &str) -> EntityResult<()> {
        let sensor_id = sensor_id.to_string();
        ask(&self.sender, &self.label, |respond_to| ZoneCommand::RemoveSensor {
            sensor_id,
            respond_to,
        })
        .await?
    }

    /// The last computed status, running a cycle first if there is none yet
    pub async fn get_zone_status(&self) -> EntityResult<ZoneStatus> {
        ask(&self.sender, &self.label, |respond_to| ZoneCommand::GetStatus {
            respond_to,
        })
        .await?
    }

    pub async fn get_active_alerts(&self) -> EntityResult<Vec<Alert>> {
        ask(&self.sender, &self.label, |respond_to| {
            ZoneCommand::GetActiveAlerts { respond_to }
        })
        .await?
    }

    pub async fn is_leak_detected(&self) -> EntityResult<bool> {
        ask(&self.sender, &self.label, |respond_to| {
            ZoneCommand::IsLeakDetected { respond_to }
        })
        .await
    }

    pub async fn refresh(&self) -> EntityResult<ZoneStatus> {
        ask(&self.sender, &self.label, |respond_to| ZoneCommand::Refresh {
            respond_to: Some(respond_to),
        })
        .await?
    }

    /// Queue a cycle without waiting for it
    pub async fn request_refresh(&self) {
        if self
            .sender
            .send(ZoneCommand::Refresh { respond_to: None })
            .await
            .is_err()
        {
            warn!("zone {} is gone, refresh dropped", self.zone_id);
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(ZoneCommand::Shutdown).await;
    }
}
