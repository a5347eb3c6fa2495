//! Mining Supervisor - Main Application
//!
//! Starts the configured miner and keeps it running until Ctrl-C.

use anyhow::Context;
use mining_supervisor::{
    config::Config, logging::init_logging, InstanceFactory, APP_NAME, APP_VERSION,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load and validate configuration
    let config = Config::load().await.context("Failed to load configuration")?;

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    let _log_guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;

    info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let descriptor = config.registry().get(config.miner_name()?)?;
    let reward = config.reward()?;
    let factory = InstanceFactory::new().with_watch_interval(config.watch_interval_duration()?);
    let instance = factory.create(
        descriptor,
        config.hardware.clone(),
        config.algorithm()?,
        &reward.coin,
        &reward.address,
        config.pool()?.clone(),
    )?;

    info!(
        "Configuration: miner={}, algorithm={}, pool={}, devices={}",
        instance.descriptor().name,
        instance.algorithm(),
        instance.endpoint(),
        instance.hardware().len()
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let task = instance.run(shutdown)?;
    if let Err(e) = task.await {
        error!("Miner supervision failed ({}): {}", e.category(), e);
        return Err(e).context("Miner supervision failed");
    }

    info!("{} stopped", instance.descriptor().name);
    Ok(())
}

/// Print current configuration
fn print_configuration(config: &Config) -> anyhow::Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}
