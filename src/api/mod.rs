//! REST API for the monitoring engine
//!
//! Every route forwards to one entity operation: sensor routes resolve the
//! sensor through the directory, zone routes the zone, and system-wide
//! routes go through the manager.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/sensors/:id/register` - Register a sensor
//! - `GET /api/v1/sensors/:id` - Current reading
//! - `PUT /api/v1/sensors/:id/reading` - Replace the measurements
//! - `GET /api/v1/zones` - Status of every registered zone
//! - `GET /api/v1/zones/:id/status` - Zone status
//! - `GET /api/v1/system/overview` - System-wide figures
//! - `POST /api/v1/system/initialize` - Load the demo zones

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post, put},
};
use tracing::info;

use crate::config::ApiSection;

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    use routes::{health, sensors, system, zones};

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/sensors/:id", get(sensors::get_sensor))
        .route("/api/v1/sensors/:id/register", post(sensors::register_sensor))
        .route("/api/v1/sensors/:id/reading", put(sensors::update_reading))
        .route("/api/v1/sensors/:id/simulate", post(sensors::simulate))
        .route("/api/v1/sensors/:id/activate", post(sensors::activate))
        .route("/api/v1/sensors/:id/deactivate", post(sensors::deactivate))
        .route("/api/v1/sensors/:id/anomalies", get(sensors::check_anomalies))
        .route("/api/v1/sensors/:id/history", get(sensors::get_history))
        .route("/api/v1/zones", get(zones::list_zones))
        .route("/api/v1/zones/:id/register", post(zones::register_zone))
        .route("/api/v1/zones/:id/status", get(zones::get_status))
        .route("/api/v1/zones/:id/alerts", get(zones::get_active_alerts))
        .route("/api/v1/zones/:id/alerts/recent", get(zones::get_recent_alerts))
        .route("/api/v1/zones/:id/leak", get(zones::is_leak_detected))
        .route(
            "/api/v1/zones/:id/sensors/:sensor",
            post(zones::add_sensor).delete(zones::remove_sensor),
        )
        .route("/api/v1/zones/:id/refresh", post(zones::refresh))
        .route("/api/v1/alerts/critical", get(system::get_critical_alerts))
        .route("/api/v1/leaks", get(system::get_leaks))
        .route("/api/v1/system/overview", get(system::get_overview))
        .route("/api/v1/system/initialize", post(system::initialize))
        .with_state(state)
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiSection, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind);

    let mut app = router(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
