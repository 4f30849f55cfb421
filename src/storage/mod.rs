//! Durable store for sensor readings, zone statuses and alerts
//!
//! ## Design
//!
//! - **Trait-based**: entities only see `Arc<dyn StorageBackend>`
//! - **Async**: all operations are async so entities can await them in their loops
//! - **Append-only readings**: every saved reading is kept as history, the latest one wins
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database with migrations
//! - **In-Memory**: no persistence, used for tests and when storage is disabled

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use crate::config::StorageConfig;

/// Build the backend selected in the configuration
pub async fn open_backend(config: Option<&StorageConfig>) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        None | Some(StorageConfig::None) => {
            info!("using in-memory storage backend");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        Some(StorageConfig::Sqlite { path, .. }) => {
            let backend = sqlite::SqliteBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        Some(StorageConfig::Sqlite { .. }) => Err(StorageError::ConnectionFailed(
            "sqlite support was not compiled in".to_string(),
        )),
    }
}
