use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use water_monitoring::{
    config::{Config, read_config_file},
    system::WaterSystem,
    util::get_config_path,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (falls back to $WATER_CONFIG, then to defaults)
    #[arg(short, long)]
    file: Option<String>,

    /// Log level for this crate
    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("water_monitoring", level),
        ("water_hub", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    match args.file.clone().or_else(get_config_path) {
        Some(path) => {
            read_config_file(&path).with_context(|| format!("failed to load config from {path}"))
        }
        None => {
            debug!("no config file given, using defaults");
            Ok(Config::default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;

    let system = WaterSystem::start(&config)
        .await
        .context("failed to start water system")?;
    let manager = system.manager().await;

    if config.initialize_test_data {
        info!("initializing test data");
        manager
            .initialize_test_data()
            .await
            .context("failed to initialize test data")?;
    }

    #[cfg(feature = "api")]
    {
        let mut api = config.api.clone().unwrap_or_default();
        if let Some(addr) = water_monitoring::util::get_api_addr() {
            api.bind = addr;
        }
        let state = water_monitoring::api::ApiState::new(&system).await;
        water_monitoring::api::spawn_api_server(api, state).await?;
    }

    let mut ticker = tokio::time::interval(config.refresh.interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match manager.get_system_overview().await {
                    Ok(overview) => info!(
                        "{} zones, {} sensors, {:.1} L/min, {} zones with issues, {} critical alerts",
                        overview.total_zones,
                        overview.total_sensors,
                        overview.total_flow_rate,
                        overview.zones_with_issues,
                        overview.active_critical_alerts
                    ),
                    Err(e) => error!("failed to compute system overview: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c");
                break;
            }
        }
    }

    system.shutdown().await;

    Ok(())
}
