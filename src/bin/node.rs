//! # Thermolink Sensor Node
//!
//! Measures temperature once per period, records each reading locally and
//! sends it to the telemetry server, reconnecting whenever the link drops.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration
//!    - Log to the console and to the local log file
//!    - Calibrate against the reference temperature (fatal on sensor failure)
//!
//! 2. **Main Loop**
//!    - Read, calibrate and log one reading per period
//!    - Connect if disconnected, send, wait for the acknowledgement
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Usage
//!
//! ```bash
//! thermolink-node --config config/default.toml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;

use thermolink::config::Config;
use thermolink::node::{ConnectionManager, SensorNode};
use thermolink::sensor::{build_sensor, CalibrationOffset};

/// Temperature sensor node for the Thermolink server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging: console plus local log file
    let log_path = Path::new(&config.node.log_file);
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let log_name = log_path
        .file_name()
        .context("node log_file must name a file")?;
    let (file_writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, log_name));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("Thermolink node v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut sensor = build_sensor(&config.sensor);
    let offset = CalibrationOffset::from_config(&mut sensor, &config.calibration)
        .await
        .context("Calibration failed: sensor unavailable")?;
    info!("Calibration offset: {:.2}F", offset.fahrenheit());

    let connection = ConnectionManager::from_config(&config.node);
    let mut node = SensorNode::new(sensor, offset, connection, config.node.send_interval());

    info!("Press Ctrl+C to exit");
    let cycles = node
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    info!("Total cycles: {}", cycles);

    Ok(())
}
