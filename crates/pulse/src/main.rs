//! Pulse server entry point: CLI, configuration, logging, and the network
//! tick loop.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{Context, Result};
use cli::CliArgs;
use config::AppConfig;
use pulse_network::{Network, NetworkEvents};
use tracing::info;

/// Applies command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(address) = &args.bind_address {
        config.server.address = address.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(tps) = args.ticks_per_second {
        config.server.ticks_per_second = tps;
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let (mut config, created) = AppConfig::load_from_file(&args.config_path).await?;
    apply_overrides(&mut config, &args);
    config.validate().context("Configuration validation failed")?;

    logging::setup_logging(&config.logging)?;
    if created {
        info!("Created default configuration file: {}", args.config_path.display());
    }

    let network_config = config.to_network_config()?;
    info!(
        "Pulse v{} | Config: {} | {} TPS",
        env!("CARGO_PKG_VERSION"),
        args.config_path.display(),
        network_config.ticks_per_second
    );

    let network = Network::new(network_config, NetworkEvents::default());
    let ticks = network.run(signals::shutdown_signal()).await?;

    info!("Shutdown complete after {} ticks", ticks);
    Ok(())
}
