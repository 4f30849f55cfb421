//! Message types for entity communication
//!
//! Every entity owns an mpsc mailbox and handles one command at a time,
//! which is what makes each entity a single writer of its own state.
//! Queries carry a oneshot `respond_to` channel; fire-and-forget
//! commands carry none.

use tokio::sync::{mpsc, oneshot};

use crate::{
    Alert, EntityError, EntityResult, ReadingUpdate, RegistrationOutcome, SensorKind,
    SensorReading, SystemOverview, ZoneStatus,
};

/// Commands that can be sent to a SensorActor
#[derive(Debug)]
pub enum SensorCommand {
    Register {
        location: String,
        kind: SensorKind,
        zone_id: String,
        respond_to: oneshot::Sender<EntityResult<RegistrationOutcome>>,
    },

    GetCurrentData {
        respond_to: oneshot::Sender<EntityResult<SensorReading>>,
    },

    /// Replace the measurements with externally supplied values
    UpdateReading {
        update: ReadingUpdate,
        respond_to: oneshot::Sender<EntityResult<SensorReading>>,
    },

    /// Random-walk the measurements one step
    Simulate {
        respond_to: oneshot::Sender<EntityResult<SensorReading>>,
    },

    SetActive {
        active: bool,
        respond_to: oneshot::Sender<EntityResult<()>>,
    },

    IsActive {
        respond_to: oneshot::Sender<bool>,
    },

    CheckAnomalies {
        respond_to: oneshot::Sender<EntityResult<Vec<Alert>>>,
    },

    /// Drop in-memory state and stop; the next lookup reactivates from the store
    Shutdown,
}

/// Commands that can be sent to a ZoneActor
#[derive(Debug)]
pub enum ZoneCommand {
    Register {
        name: String,
        sensor_ids: Vec<String>,
        respond_to: oneshot::Sender<EntityResult<ZoneStatus>>,
    },

    AddSensor {
        sensor_id: String,
        respond_to: oneshot::Sender<EntityResult<()>>,
    },

    RemoveSensor {
        sensor_id: String,
        respond_to: oneshot::Sender<EntityResult<()>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<EntityResult<ZoneStatus>>,
    },

    GetActiveAlerts {
        respond_to: oneshot::Sender<EntityResult<Vec<Alert>>>,
    },

    IsLeakDetected {
        respond_to: oneshot::Sender<bool>,
    },

    /// Run one aggregation cycle now
    ///
    /// Sensors use this without a responder after they change activity.
    Refresh {
        respond_to: Option<oneshot::Sender<EntityResult<ZoneStatus>>>,
    },

    Shutdown,
}

/// Commands that can be sent to the ManagerActor
#[derive(Debug)]
pub enum ManagerCommand {
    RegisterZone {
        zone_id: String,
        name: String,
        sensor_ids: Vec<String>,
        respond_to: oneshot::Sender<EntityResult<RegistrationOutcome>>,
    },

    RegisterSensor {
        sensor_id: String,
        location: String,
        kind: SensorKind,
        zone_id: String,
        respond_to: oneshot::Sender<EntityResult<RegistrationOutcome>>,
    },

    GetAllZonesStatus {
        respond_to: oneshot::Sender<Vec<ZoneStatus>>,
    },

    GetCriticalAlerts {
        respond_to: oneshot::Sender<Vec<Alert>>,
    },

    GetSensorData {
        sensor_id: String,
        respond_to: oneshot::Sender<EntityResult<SensorReading>>,
    },

    GetSystemOverview {
        respond_to: oneshot::Sender<SystemOverview>,
    },

    DetectedLeaks {
        respond_to: oneshot::Sender<Vec<String>>,
    },

    InitializeTestData {
        respond_to: oneshot::Sender<EntityResult<()>>,
    },

    Shutdown,
}

/// Send a query to an entity mailbox and wait for its answer
///
/// A closed mailbox or a dropped responder both mean the entity is gone.
pub(crate) async fn ask<C, T>(
    sender: &mpsc::Sender<C>,
    entity: &str,
    command: impl FnOnce(oneshot::Sender<T>) -> C,
) -> EntityResult<T> {
    let (tx, rx) = oneshot::channel();
    sender
        .send(command(tx))
        .await
        .map_err(|_| EntityError::Unavailable(entity.to_string()))?;
    rx.await
        .map_err(|_| EntityError::Unavailable(entity.to_string()))
}
