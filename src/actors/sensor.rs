//! SensorActor - owns the latest reading of one physical sensor
//!
//! ## Lifecycle
//!
//! Unregistered → Active ⇄ Inactive. Registration happens once per id;
//! there is no way back to unregistered. Activity changes are persisted
//! and trigger a refresh of the owning zone.
//!
//! On activation the actor restores its reading from the durable store,
//! falling back to the cache only when the store cannot be reached.

use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, instrument, trace, warn};

use super::directory::{Directory, EntityHandle};
use super::messages::{SensorCommand, ask};
use crate::cache::{self, sensor_key};
use crate::monitors::anomaly;
use crate::seed;
use crate::{
    Alert, EntityError, EntityResult, ReadingUpdate, RegistrationOutcome, SensorKind,
    SensorReading,
};

const SENSOR_MAILBOX_SIZE: usize = 32;

/// Actor that owns one sensor's latest reading
pub struct SensorActor {
    /// Sensor identifier (directory key)
    sensor_id: String,

    /// Shared services and access to the owning zone
    directory: Directory,

    /// Command receiver for queries and updates
    command_rx: mpsc::Receiver<SensorCommand>,

    /// None until registered (or restored)
    reading: Option<SensorReading>,

    /// Random source for seeding and simulated drift
    source: StdRng,
}

impl SensorActor {
    /// Create a new sensor actor with its own random source
    pub fn new(
        sensor_id: String,
        directory: Directory,
        command_rx: mpsc::Receiver<SensorCommand>,
    ) -> Self {
        let source = directory.services().seeder.source_for(&sensor_id);
        Self {
            sensor_id,
            directory,
            command_rx,
            reading: None,
            source,
        }
    }

    /// Run the actor's main loop
    ///
    /// Restores the reading first, then runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    /// - The idle timeout passes with an empty mailbox
    #[instrument(skip(self), fields(sensor_id = %self.sensor_id))]
    pub async fn run(mut self) {
        self.restore().await;

        let idle_timeout = self.directory.services().timing.sensor_idle_timeout;

        loop {
            let idle = async {
                match idle_timeout {
                    Some(timeout) => time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            debug!("sensor shut down");
                            break;
                        }
                    }
                    None => {
                        warn!("command channel closed, shutting down");
                        break;
                    }
                },
                _ = idle => {
                    if self.directory.retire_sensor(&self.sensor_id, &mut self.command_rx).await {
                        // late sends on an old handle are dropped and answered with Unavailable
                        debug!("sensor idle, deactivating");
                        break;
                    }
                    trace!("idle timeout with pending commands, staying active");
                }
            }
        }
    }

    async fn restore(&mut self) {
        let services = self.directory.services();

        match services.store.latest_sensor_reading(&self.sensor_id).await {
            Ok(Some(reading)) => {
                trace!("restored reading from store");
                self.reading = Some(reading);
            }
            Ok(None) => trace!("no stored reading, sensor is unregistered"),
            Err(e) => {
                warn!("failed to load sensor from store, trying cache: {:#}", e);
                self.reading =
                    cache::read_through(services.cache.as_ref(), &sensor_key(&self.sensor_id))
                        .await;
            }
        }
    }

    /// Returns false once the actor should stop
    async fn handle_command(&mut self, cmd: SensorCommand) -> bool {
        match cmd {
            SensorCommand::Register {
                location,
                kind,
                zone_id,
                respond_to,
            } => {
                let result = self.register(location, kind, zone_id).await;
                let _ = respond_to.send(result);
            }
            SensorCommand::GetCurrentData { respond_to } => {
                let _ = respond_to.send(self.registered().cloned());
            }
            SensorCommand::UpdateReading { update, respond_to } => {
                let result = match update.validate() {
                    Ok(()) => self.commit_measurements(update).await,
                    Err(e) => Err(e),
                };
                let _ = respond_to.send(result);
            }
            SensorCommand::Simulate { respond_to } => {
                let result = match self.registered().map(SensorReading::measurements) {
                    Ok(current) => {
                        let next = seed::drift(&current, &mut self.source);
                        self.commit_measurements(next).await
                    }
                    Err(e) => Err(e),
                };
                let _ = respond_to.send(result);
            }
            SensorCommand::SetActive { active, respond_to } => {
                let result = self.set_active(active).await;
                let _ = respond_to.send(result);
            }
            SensorCommand::IsActive { respond_to } => {
                let active = self.reading.as_ref().is_some_and(|r| r.active);
                let _ = respond_to.send(active);
            }
            SensorCommand::CheckAnomalies { respond_to } => {
                let result = self.check_anomalies().await;
                let _ = respond_to.send(result);
            }
            SensorCommand::Shutdown => return false,
        }
        true
    }

    fn registered(&self) -> EntityResult<&SensorReading> {
        self.reading
            .as_ref()
            .ok_or_else(|| EntityError::NotRegistered(format!("sensor {}", self.sensor_id)))
    }

    /// Durable store first, then the cache mirror
    async fn persist(&self, reading: &SensorReading) -> EntityResult<()> {
        let services = self.directory.services();
        services.store.save_sensor_reading(reading).await?;
        cache::write_through(services.cache.as_ref(), &sensor_key(&self.sensor_id), reading).await;
        Ok(())
    }

    async fn register(
        &mut self,
        location: String,
        kind: SensorKind,
        zone_id: String,
    ) -> EntityResult<RegistrationOutcome> {
        if let Some(reading) = &self.reading {
            debug!("sensor already registered in zone {}", reading.zone_id);
            return Ok(RegistrationOutcome::AlreadyExists);
        }

        let store = &self.directory.services().store;
        if store.sensor_exists(&self.sensor_id, &zone_id).await? {
            debug!("sensor already stored for zone {}", zone_id);
            return Ok(RegistrationOutcome::AlreadyExists);
        }

        let measurements = seed::initial_measurements(&mut self.source);
        let reading = SensorReading::new(&self.sensor_id, &zone_id, location, kind, measurements);
        self.persist(&reading).await?;
        self.reading = Some(reading);

        info!("registered sensor in zone {}", zone_id);

        let zone = self.directory.zone(&zone_id).await;
        if let Err(e) = zone.add_sensor(&self.sensor_id).await {
            warn!("zone {} did not accept the sensor: {:#}", zone_id, e);
        }

        Ok(RegistrationOutcome::Created)
    }

    async fn commit_measurements(&mut self, update: ReadingUpdate) -> EntityResult<SensorReading> {
        let mut reading = self.registered()?.clone();
        reading.apply(&update);
        self.persist(&reading).await?;
        self.reading = Some(reading.clone());
        trace!("reading updated");
        Ok(reading)
    }

    async fn set_active(&mut self, active: bool) -> EntityResult<()> {
        let mut reading = self.registered()?.clone();
        if reading.active == active {
            return Ok(());
        }

        reading.active = active;
        self.persist(&reading).await?;
        let zone_id = reading.zone_id.clone();
        self.reading = Some(reading);

        info!("sensor {}", if active { "activated" } else { "deactivated" });

        // the zone may be mid-refresh waiting on this sensor, so never await it here
        let directory = self.directory.clone();
        tokio::spawn(async move {
            directory.zone(&zone_id).await.request_refresh().await;
        });

        Ok(())
    }

    async fn check_anomalies(&self) -> EntityResult<Vec<Alert>> {
        let reading = self.registered()?;
        let alerts = anomaly::check_anomalies(reading);

        let store = &self.directory.services().store;
        for alert in &alerts {
            store.save_alert(alert).await?;
        }

        if !alerts.is_empty() {
            debug!("{} anomalies detected", alerts.len());
        }
        Ok(alerts)
    }
}

/// Handle for talking to a SensorActor
#[derive(Clone, Debug)]
pub struct SensorHandle {
    sensor_id: String,
    label: String,
    sender: mpsc::Sender<SensorCommand>,
}

impl EntityHandle for SensorHandle {
    fn spawn(key: &str, directory: Directory) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(SENSOR_MAILBOX_SIZE);
        let actor = SensorActor::new(key.to_string(), directory, cmd_rx);

        tokio::spawn(actor.run());

        Self {
            sensor_id: key.to_string(),
            label: format!("sensor {key}"),
            sender: cmd_tx,
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn request_shutdown(&self) {
        let _ = self.sender.try_send(SensorCommand::Shutdown);
    }
}

impl SensorHandle {
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Idempotent: an already registered sensor reports `AlreadyExists`
    pub async fn register(
        &self,
        location: impl Into<String>,
        kind: SensorKind,
        zone_id: impl Into<String>,
    ) -> EntityResult<RegistrationOutcome> {
        let (location, zone_id) = (location.into(), zone_id.into());
        ask(&self.sender, &self.label, |respond_to| SensorCommand::Register {
            location,
            kind,
            zone_id,
            respond_to,
        })
        .await?
    }

    pub async fn current_data(&self) -> EntityResult<SensorReading> {
        ask(&self.sender, &self.label, |respond_to| {
            SensorCommand::GetCurrentData { respond_to }
        })
        .await?
    }

    pub async fn update_reading(&self, update: ReadingUpdate) -> EntityResult<SensorReading> {
        ask(&self.sender, &self.label, |respond_to| {
            SensorCommand::UpdateReading { update, respond_to }
        })
        .await?
    }

    pub async fn simulate(&self) -> EntityResult<SensorReading> {
        ask(&self.sender, &self.label, |respond_to| SensorCommand::Simulate {
            respond_to,
        })
        .await?
    }

    pub async fn activate(&self) -> EntityResult<()> {
        self.set_active(true).await
    }

    pub async fn deactivate(&self) -> EntityResult<()> {
        self.set_active(false).await
    }

    async fn set_active(&self, active: bool) -> EntityResult<()> {
        ask(&self.sender, &self.label, |respond_to| SensorCommand::SetActive {
            active,
            respond_to,
        })
        .await?
    }

    /// Unregistered sensors are never active
    pub async fn is_active(&self) -> EntityResult<bool> {
        ask(&self.sender, &self.label, |respond_to| SensorCommand::IsActive {
            respond_to,
        })
        .await
    }

    /// Evaluate the current reading and persist every alert raised
    pub async fn check_anomalies(&self) -> EntityResult<Vec<Alert>> {
        ask(&self.sender, &self.label, |respond_to| {
            SensorCommand::CheckAnomalies { respond_to }
        })
        .await?
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SensorCommand::Shutdown).await;
    }
}
