//! # Thermolink Server
//!
//! Accepts sensor node connections, acknowledges every frame and appends
//! each reading to the telemetry log.
//!
//! # Usage
//!
//! ```bash
//! thermolink-server [PORT] [--config config/default.toml]
//! ```
//!
//! Expected output:
//! ```text
//! INFO thermolink::server: Listening on 0.0.0.0:5005 (TCP)
//! INFO thermolink_server: Local network interfaces:
//! INFO thermolink_server:  - en0: 10.0.0.12
//! INFO thermolink::server: Connected from 10.0.0.88:49152
//! INFO thermolink::server::handler: 10.0.0.88:49152 - {"celsius":22.5,"fahrenheit":72.5}
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use thermolink::config::Config;
use thermolink::server::{local_interfaces, SpawnPerConnection, TelemetryServer};
use thermolink::telemetry::TelemetryLog;

/// Threaded TCP JSON receiver for sensor node readings
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Listen port, overriding the configured one
    port: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Thermolink server v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = &args.port {
        match port.parse::<u16>() {
            Ok(p) if p != 0 => config.server.port = p,
            _ => warn!("Invalid port {:?}, using {}", port, config.server.port),
        }
    }

    let log = TelemetryLog::open(&config.server.log_file, config.server.csv_path().as_deref())
        .await
        .context("Failed to open telemetry log")?;

    let server = TelemetryServer::bind(&config.server.bind_addr(), Arc::new(log), SpawnPerConnection)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr()))?;

    info!("Local network interfaces:");
    for (name, ip) in local_interfaces() {
        info!(" - {}: {}", name, ip);
    }

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = server.run() => {}

        // Handle Ctrl+C for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
