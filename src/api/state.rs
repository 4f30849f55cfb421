//! API shared state containing entity handles

use std::sync::Arc;

use crate::actors::{Directory, ManagerHandle};
use crate::storage::StorageBackend;
use crate::system::WaterSystem;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Resolves sensor and zone handles by key
    pub directory: Directory,

    /// The system-wide manager entity
    pub manager: ManagerHandle,

    /// Durable store for history queries
    pub store: Arc<dyn StorageBackend>,
}

impl ApiState {
    pub async fn new(system: &WaterSystem) -> Self {
        Self {
            directory: system.directory().clone(),
            manager: system.manager().await,
            store: system.store(),
        }
    }
}
