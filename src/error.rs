//! Errors surfaced by sensor, zone and manager entities

use thiserror::Error;

use crate::storage::StorageError;

pub type EntityResult<T> = Result<T, EntityError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    /// The sensor or zone has never been registered
    #[error("{0} is not registered")]
    NotRegistered(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The durable store failed; the message carries the backend error
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// The entity's mailbox is closed
    #[error("entity {0} is unavailable")]
    Unavailable(String),

    #[error("entity {0} did not respond in time")]
    Timeout(String),
}

impl From<StorageError> for EntityError {
    fn from(err: StorageError) -> Self {
        EntityError::DependencyUnavailable(err.to_string())
    }
}
