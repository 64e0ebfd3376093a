use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use owen_gateway::bus::Bus;
use owen_gateway::config::Config;
use owen_gateway::engine;
use owen_gateway::http::{router, AppState};
use owen_gateway::rate::RateProjector;
use owen_gateway::registry::SensorRegistry;
use owen_gateway::uplink;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Polling gateway for OWEN-family (СИ8) pulse counters")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml", env = "OWEN_CONFIG")]
    config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "OWEN_LISTEN_ADDR")]
    listen_addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bus = Bus::open(config.serial.clone())?;
    bus.reopen()?;

    let registry = SensorRegistry::new(bus, config.sensors.clone())?;
    info!(sensors = registry.len(), "sensor registry ready");

    let state = Arc::new(AppState {
        registry,
        http_projector: RateProjector::new(),
        probe_serial: config.serial.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&cli.listen_addr).await?;
    info!(addr = %cli.listen_addr, "listening");

    let poll_delay = std::time::Duration::from_secs_f64(config.poll_delay_secs);
    tokio::spawn({
        let state = state.clone();
        async move {
            engine::run(&state.registry, poll_delay).await;
        }
    });

    if config.poller_active {
        let receiver_url = config
            .receiver_url
            .clone()
            .expect("validated at config load time");
        let receiver_token = config.receiver_token.clone();
        let timeout = std::time::Duration::from_secs_f64(config.poller_connection_timeout_secs);
        tokio::spawn({
            let state = state.clone();
            async move {
                uplink::run(&state.registry, receiver_url, receiver_token, timeout).await;
            }
        });
    }

    axum::serve(listener, router(state)).await?;
    Ok(())
}
