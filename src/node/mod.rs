//! # Sensor Node Module
//!
//! Client side of the telemetry link.
//!
//! This module handles:
//! - Taking one calibrated reading per loop tick
//! - Recording every reading locally, connected or not
//! - Keeping a reconnecting TCP connection to the server
//! - Sending each reading and waiting for its acknowledgement
//!
//! The loop period is fixed and independent of the connection state.

pub mod connection;
pub mod reconnect;

use std::future::Future;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::TelemetryError;
use crate::protocol::messages::{Acknowledgement, Payload};
use crate::sensor::{CalibrationOffset, Reading, TemperatureSensor};
pub use connection::{AckReply, ConnectionManager, ConnectionState};
pub use reconnect::ReconnectPolicy;

/// What happened during one send cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The server acknowledged the reading
    Acknowledged(Acknowledgement),
    /// The server replied with something that is not an acknowledgement
    UnrecognizedReply(String),
    /// No connection; the reading was only recorded locally
    Offline,
    /// Send or ack wait failed; the connection was dropped
    TransportFailed,
    /// The sensor could not be read; nothing was sent
    SensorFault,
}

/// Sensor node: reading source, calibration and connection
pub struct SensorNode<S> {
    sensor: S,
    offset: CalibrationOffset,
    connection: ConnectionManager,
    period: Duration,
}

impl<S> std::fmt::Debug for SensorNode<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorNode")
            .field("offset", &self.offset)
            .field("connection", &self.connection)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl<S: TemperatureSensor> SensorNode<S> {
    pub fn new(
        sensor: S,
        offset: CalibrationOffset,
        connection: ConnectionManager,
        period: Duration,
    ) -> Self {
        Self {
            sensor,
            offset,
            connection,
            period,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Take a calibrated reading
    pub fn read(&mut self) -> crate::error::Result<Reading> {
        let raw = self.sensor.read_celsius()?;
        Ok(Reading::from_measurement(raw, self.offset))
    }

    /// Run one measure → send → acknowledge cycle
    ///
    /// Never fails: every problem is logged and reported in the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let reading = match self.read() {
            Ok(reading) => reading,
            Err(e) => {
                error!("Sensor read failed: {}", e);
                return CycleOutcome::SensorFault;
            }
        };
        info!("Measured {}", reading);

        match self.connection.ensure_connected().await {
            Ok(()) => {}
            Err(TelemetryError::NotConnected) => return CycleOutcome::Offline,
            Err(e) => {
                warn!("TCP connect error: {}", e);
                return CycleOutcome::Offline;
            }
        }

        match self.connection.send(&Payload::from(&reading)).await {
            Ok(AckReply::Ack(ack)) => {
                info!("ACK from server: {:?}", ack);
                CycleOutcome::Acknowledged(ack)
            }
            Ok(AckReply::Raw(line)) => {
                warn!("ACK raw: {}", line);
                CycleOutcome::UnrecognizedReply(line)
            }
            Err(e) => {
                warn!("No ACK (timeout/error): {}", e);
                CycleOutcome::TransportFailed
            }
        }
    }

    /// Run cycles on a fixed period until `shutdown` resolves
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) -> u64 {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Starting send loop to {} every {:?}",
            self.connection.addr(),
            self.period
        );

        let mut cycles: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    debug!("Cycle {}: {:?}", cycles, outcome);
                    cycles += 1;
                }

                _ = &mut shutdown => {
                    info!("Shutting down after {} cycles", cycles);
                    break;
                }
            }
        }

        self.connection.disconnect();
        cycles
    }
}
