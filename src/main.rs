use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use log::{info, warn};
use tokio::sync::mpsc;

mod config;
mod controller;
mod debounce;
mod error;
mod messages;
mod mqtt;
mod occupancy;
mod scheduler;
mod sensor;
mod unifi;
mod watch;

use crate::messages::Trigger;

#[derive(Parser, Debug)]
#[command(version, about = "Occupancy sensor driven by UniFi client presence")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logger(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    let config = config::AppConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let registry = watch::WatchRegistry::from_config(&config.sensor.watch);
    let watch_is_empty = registry.is_empty();
    for entry in registry.entries() {
        match entry.access_point {
            Some(ap) => info!("Watching {} on AP {}", entry.device, ap),
            None => info!("Watching {}", entry.device),
        }
    }
    let evaluator = occupancy::Evaluator::new(
        registry,
        config.sensor.watch_guests(),
        config.sensor.mode,
    );
    if watch_is_empty {
        warn!(
            "Watch list for {} is empty; mode {} will always report {}",
            config.sensor.name,
            config.sensor.mode,
            evaluator.unwatched_verdict()
        );
    }

    let controller = Arc::new(unifi::UnifiController::new(&config.controller)?);
    if let Err(err) = controller.login().await {
        warn!("Initial UniFi login failed, will retry on first fetch: {err}");
    }

    let state = Arc::new(sensor::SensorState::default());
    let (tx, rx) = mpsc::channel(32);

    let (mqtt_client, mut eventloop) = mqtt::MqttClient::new(&config.mqtt, &config.sensor);
    mqtt_client.subscribe().await?;

    {
        let client = mqtt_client.clone();
        let tx = tx.clone();
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            client.event_loop(&mut eventloop, tx, state).await;
        });
    }

    {
        let controller = Arc::clone(&controller);
        let tx = tx.clone();
        tokio::spawn(async move {
            controller.listen(tx).await;
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(err) => warn!("Unable to listen for shutdown signal: {err}"),
        }
        let _ = tx.send(Trigger::Shutdown).await;
    });

    let core = scheduler::Scheduler::new(
        controller,
        evaluator,
        Arc::new(mqtt_client.clone()),
        state,
        config.sensor.interval(),
        config.sensor.debounce(),
    );
    core.run(rx).await;

    mqtt_client.disconnect().await?;
    info!("Exiting");

    Ok(())
}
