use std::net::SocketAddr;

const WATER_CONFIG: &str = "WATER_CONFIG";

/// Config file path from the environment, used when `--file` is absent
pub fn get_config_path() -> Option<String> {
    std::env::var(WATER_CONFIG).ok()
}

const WATER_API_ADDR: &str = "WATER_API_ADDR";

/// Overrides the configured API bind address
pub fn get_api_addr() -> Option<SocketAddr> {
    std::env::var(WATER_API_ADDR)
        .ok()
        .and_then(|addr| addr.parse().ok())
}
