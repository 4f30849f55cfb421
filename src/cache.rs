//! Best-effort key/value mirror of entity state
//!
//! The cache is never authoritative: writes are fire-and-forget and read
//! failures are treated as a miss. Values are stored as JSON.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{trace, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: serde_json::Value) -> CacheResult<()>;
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>>;
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

pub fn sensor_key(sensor_id: &str) -> String {
    format!("sensor:{sensor_id}")
}

pub fn zone_key(zone_id: &str) -> String {
    format!("zone:{zone_id}")
}

/// Mirror a value into the cache, logging and swallowing any failure
pub async fn write_through<T: Serialize>(cache: &dyn Cache, key: &str, value: &T) {
    let result = match serde_json::to_value(value) {
        Ok(json) => cache.set(key, json).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => trace!("cached {}", key),
        Err(e) => warn!("failed to write {} to cache: {:#}", key, e),
    }
}

/// Read a mirrored value; every failure counts as a miss
pub async fn read_through<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(json)) => match serde_json::from_value(json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("discarding malformed cache entry {}: {:#}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("failed to read {} from cache: {:#}", key, e);
            None
        }
    }
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: serde_json::Value) -> CacheResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
