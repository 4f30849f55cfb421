use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::AlertSeverity;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Readings and alerts older than this are deleted daily
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./water.db")
}

fn default_retention_days() -> u32 {
    30
}

/// Zone refresh timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound for each call a zone makes to one of its sensors
    #[serde(default = "default_sensor_timeout_ms")]
    pub sensor_timeout_ms: u64,
}

impl RefreshConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            warmup_secs: default_warmup_secs(),
            interval_secs: default_interval_secs(),
            sensor_timeout_ms: default_sensor_timeout_ms(),
        }
    }
}

fn default_warmup_secs() -> u64 {
    5
}

fn default_interval_secs() -> u64 {
    30
}

fn default_sensor_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
    /// Alerts below this severity are not delivered
    #[serde(default = "default_min_severity")]
    pub min_severity: AlertSeverity,
}

fn default_min_severity() -> AlertSeverity {
    AlertSeverity::Critical
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NotificationConfig {
    pub webhook: Option<Webhook>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_api_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
            enable_cors: true,
        }
    }
}

fn default_api_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    256
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Sensors that receive no command for this long are deactivated (in memory only)
    pub sensor_idle_timeout_secs: Option<u64>,

    /// Makes seeded readings reproducible
    pub seed: Option<u64>,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Storage configuration (optional - defaults to in-memory)
    pub storage: Option<StorageConfig>,

    pub notifications: Option<NotificationConfig>,

    pub api: Option<ApiSection>,

    /// Register the built-in demo zones on startup
    #[serde(default)]
    pub initialize_test_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig::default(),
            sensor_idle_timeout_secs: None,
            seed: None,
            bus_capacity: default_bus_capacity(),
            storage: None,
            notifications: None,
            api: None,
            initialize_test_data: false,
        }
    }
}

impl Config {
    pub fn sensor_idle_timeout(&self) -> Option<Duration> {
        self.sensor_idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn webhook(&self) -> Option<&Webhook> {
        self.notifications.as_ref().and_then(|n| n.webhook.as_ref())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
